use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{DpiError, Result};

const MAGIC_NATIVE: u32 = 0xA1B2C3D4;
const MAGIC_SWAPPED: u32 = 0xD4C3B2A1;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// The 24-byte global header of a legacy pcap capture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub network: u32,
}

/// The 16-byte per-packet record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub incl_len: u32,
    pub orig_len: u32,
}

/// A single capture-file record: header plus its exact `incl_len` payload
/// bytes.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub header: PacketHeader,
    pub data: Vec<u8>,
}

/// Reads a legacy pcap capture file as a lazy, finite, non-restartable
/// sequence of records.
///
/// End-of-file, or a short read in the middle of a record, simply ends the
/// sequence — a truncated capture is not an error (matches real-world
/// truncated captures, per spec.md §4.1 / §7 `TruncatedRecord`).
pub struct CaptureReader<R> {
    inner: R,
    global_header: GlobalHeader,
    swapped: bool,
    done: bool,
}

impl<R: Read> CaptureReader<R> {
    /// Read and validate the global header, failing open on an
    /// unrecognized magic number (`DpiError::MalformedCapture`).
    pub fn new(mut inner: R) -> Result<Self> {
        let mut buf = [0u8; GLOBAL_HEADER_LEN];
        read_exact_or_short(&mut inner, &mut buf)?
            .ok_or_else(|| DpiError::MalformedCapture("truncated global header".to_string()))?;

        let magic_le = LittleEndian::read_u32(&buf[0..4]);
        let swapped = match magic_le {
            MAGIC_NATIVE => false,
            MAGIC_SWAPPED => true,
            other => {
                return Err(DpiError::MalformedCapture(format!(
                    "unrecognized pcap magic number: 0x{other:08X}"
                )))
            }
        };

        let global_header = if swapped {
            GlobalHeader {
                magic: BigEndian::read_u32(&buf[0..4]),
                version_major: BigEndian::read_u16(&buf[4..6]),
                version_minor: BigEndian::read_u16(&buf[6..8]),
                thiszone: BigEndian::read_i32(&buf[8..12]),
                sigfigs: BigEndian::read_u32(&buf[12..16]),
                snaplen: BigEndian::read_u32(&buf[16..20]),
                network: BigEndian::read_u32(&buf[20..24]),
            }
        } else {
            GlobalHeader {
                magic: magic_le,
                version_major: LittleEndian::read_u16(&buf[4..6]),
                version_minor: LittleEndian::read_u16(&buf[6..8]),
                thiszone: LittleEndian::read_i32(&buf[8..12]),
                sigfigs: LittleEndian::read_u32(&buf[12..16]),
                snaplen: LittleEndian::read_u32(&buf[16..20]),
                network: LittleEndian::read_u32(&buf[20..24]),
            }
        };

        Ok(Self { inner, global_header, swapped, done: false })
    }

    pub fn global_header(&self) -> &GlobalHeader {
        &self.global_header
    }

    /// Only ethernet (linktype 1) is interpreted by the packet parser;
    /// other linktypes still iterate but every packet parses as "no IP".
    pub fn is_ethernet(&self) -> bool {
        self.global_header.network == 1
    }

    fn read_u32(&self, buf: &[u8]) -> u32 {
        if self.swapped {
            BigEndian::read_u32(buf)
        } else {
            LittleEndian::read_u32(buf)
        }
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = RawPacket;

    fn next(&mut self) -> Option<RawPacket> {
        if self.done {
            return None;
        }

        let mut hdr_buf = [0u8; RECORD_HEADER_LEN];
        match read_exact_or_short(&mut self.inner, &mut hdr_buf) {
            Ok(Some(())) => {}
            Ok(None) | Err(_) => {
                self.done = true;
                return None;
            }
        }

        let header = PacketHeader {
            ts_sec: self.read_u32(&hdr_buf[0..4]),
            ts_usec: self.read_u32(&hdr_buf[4..8]),
            incl_len: self.read_u32(&hdr_buf[8..12]),
            orig_len: self.read_u32(&hdr_buf[12..16]),
        };

        let mut data = vec![0u8; header.incl_len as usize];
        match read_exact_or_short(&mut self.inner, &mut data) {
            Ok(Some(())) => Some(RawPacket { header, data }),
            Ok(None) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// Reads exactly `buf.len()` bytes, returning:
/// - `Ok(Some(()))` on a full read
/// - `Ok(None)` on a clean EOF (zero bytes read) or a short read partway
///   through (not an error — a truncated capture)
/// - `Err` only on a genuine I/O error
fn read_exact_or_short<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<Option<()>> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DpiError::Io(e)),
        }
    }
    Ok(Some(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn global_header_bytes(magic: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(GLOBAL_HEADER_LEN);
        buf.extend_from_slice(&magic.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&65535u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf
    }

    fn packet_record(ts_sec: u32, ts_usec: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ts_sec.to_le_bytes());
        buf.extend_from_slice(&ts_usec.to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = global_header_bytes(0xDEADBEEF);
        assert!(CaptureReader::new(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn reads_native_endian_packets() {
        let mut bytes = global_header_bytes(MAGIC_NATIVE);
        bytes.extend(packet_record(100, 200, b"hello"));
        bytes.extend(packet_record(101, 201, b"world"));

        let reader = CaptureReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.is_ethernet());
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data, b"hello");
        assert_eq!(packets[0].header.ts_sec, 100);
        assert_eq!(packets[1].data, b"world");
    }

    #[test]
    fn swapped_endian_header_is_decoded() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC_NATIVE.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&65535u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());

        let mut pkt = Vec::new();
        pkt.extend_from_slice(&42u32.to_be_bytes());
        pkt.extend_from_slice(&7u32.to_be_bytes());
        pkt.extend_from_slice(&3u32.to_be_bytes());
        pkt.extend_from_slice(&3u32.to_be_bytes());
        pkt.extend_from_slice(b"abc");
        bytes.extend(pkt);

        let reader = CaptureReader::new(Cursor::new(bytes)).unwrap();
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].header.ts_sec, 42);
        assert_eq!(packets[0].data, b"abc");
    }

    #[test]
    fn truncated_global_header_is_malformed() {
        let bytes = vec![0u8; 10];
        assert!(CaptureReader::new(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn truncated_record_ends_stream_cleanly() {
        let mut bytes = global_header_bytes(MAGIC_NATIVE);
        bytes.extend(packet_record(1, 0, b"ok"));
        // Append a header for a packet claiming 10 bytes of payload, but
        // only provide 3.
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(b"abc");

        let reader = CaptureReader::new(Cursor::new(bytes)).unwrap();
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data, b"ok");
    }
}
