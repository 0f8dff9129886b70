mod packet;

pub use packet::{parse_frame, IpInfo, ParsedPacket, TcpInfo, TransportInfo};
