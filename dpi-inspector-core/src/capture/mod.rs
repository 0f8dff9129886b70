mod reader;

pub use reader::{CaptureReader, GlobalHeader, PacketHeader, RawPacket};
