//! Classic pcap file reader: 24-byte global header followed by
//! (16-byte record header, `caplen` bytes) records, per §3/§6.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::Error;

use super::{CaptureSource, RawFrame};

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;
const MAGIC_LE: u32 = 0xa1b2_c3d4;
const LINKTYPE_ETHERNET: u32 = 1;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ByteOrderKind {
    Little,
    Big,
}

/// Reads an entire classic-pcap capture file into memory and hands out
/// frames in order. The whole file is read up front (mirroring an mmap'd
/// capture file: the bytes outlive every frame slice handed to a caller).
pub struct PcapFileSource {
    data: Vec<u8>,
    pos: usize,
    order: ByteOrderKind,
}

fn read_u32(order: ByteOrderKind, buf: &[u8]) -> u32 {
    match order {
        ByteOrderKind::Little => LittleEndian::read_u32(buf),
        ByteOrderKind::Big => BigEndian::read_u32(buf),
    }
}

impl PcapFileSource {
    pub fn open(path: &std::path::Path) -> crate::error::Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> crate::error::Result<Self> {
        if data.len() < GLOBAL_HEADER_LEN {
            return Err(Error::BadCaptureFile("file shorter than the 24-byte global header"));
        }
        let magic_le = LittleEndian::read_u32(&data[0..4]);
        let magic_be = BigEndian::read_u32(&data[0..4]);
        let order = if magic_le == MAGIC_LE {
            ByteOrderKind::Little
        } else if magic_be == MAGIC_LE {
            ByteOrderKind::Big
        } else {
            return Err(Error::BadCaptureFile("magic number does not match pcap 0xa1b2c3d4"));
        };

        let linktype = read_u32(order, &data[20..24]);
        if linktype != LINKTYPE_ETHERNET {
            return Err(Error::UnsupportedLinkType(linktype));
        }

        Ok(PcapFileSource { data, pos: GLOBAL_HEADER_LEN, order })
    }

    pub fn snaplen(&self) -> u32 {
        read_u32(self.order, &self.data[16..20])
    }
}

impl CaptureSource for PcapFileSource {
    fn next_frame(&mut self) -> crate::error::Result<Option<RawFrame<'_>>> {
        if self.pos == self.data.len() {
            return Ok(None);
        }
        if self.pos + RECORD_HEADER_LEN > self.data.len() {
            return Err(Error::BadCaptureFile("truncated per-packet record header"));
        }
        let header = &self.data[self.pos..self.pos + RECORD_HEADER_LEN];
        let ts_sec = read_u32(self.order, &header[0..4]);
        let ts_usec = read_u32(self.order, &header[4..8]);
        let caplen = read_u32(self.order, &header[8..12]) as usize;
        let orig_len = read_u32(self.order, &header[12..16]) as usize;

        let frame_start = self.pos + RECORD_HEADER_LEN;
        let frame_end = frame_start + caplen;
        if frame_end > self.data.len() {
            return Err(Error::BadCaptureFile("truncated packet data"));
        }
        self.pos = frame_end;

        Ok(Some(RawFrame { ts_sec, ts_usec, orig_len, data: &self.data[frame_start..frame_end] }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_header(linktype: u32) -> Vec<u8> {
        let mut h = Vec::with_capacity(GLOBAL_HEADER_LEN);
        h.extend_from_slice(&MAGIC_LE.to_le_bytes());
        h.extend_from_slice(&2u16.to_le_bytes()); // version major
        h.extend_from_slice(&4u16.to_le_bytes()); // version minor
        h.extend_from_slice(&0i32.to_le_bytes()); // thiszone
        h.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
        h.extend_from_slice(&65535u32.to_le_bytes()); // snaplen
        h.extend_from_slice(&linktype.to_le_bytes());
        h
    }

    #[test]
    fn reads_one_record_in_order() {
        let mut file = global_header(LINKTYPE_ETHERNET);
        file.extend_from_slice(&10u32.to_le_bytes()); // ts_sec
        file.extend_from_slice(&20u32.to_le_bytes()); // ts_usec
        file.extend_from_slice(&4u32.to_le_bytes()); // caplen
        file.extend_from_slice(&4u32.to_le_bytes()); // origlen
        file.extend_from_slice(&[1, 2, 3, 4]);

        let mut source = PcapFileSource::from_bytes(file).unwrap();
        let frame = source.next_frame().unwrap().expect("one record present");
        assert_eq!(frame.ts_sec, 10);
        assert_eq!(frame.data, &[1, 2, 3, 4]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn non_ethernet_linktype_is_a_fatal_error() {
        let file = global_header(6); // LINKTYPE_TOKEN_RING, arbitrary non-1
        let err = PcapFileSource::from_bytes(file).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLinkType(6)));
    }
}
