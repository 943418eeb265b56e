//! pcapng capture reader
//!
//! Streams CAN frames out of a pcapng file block by block.
//!
//! ## Supported blocks
//! - Section Header (either byte order; a new section resets interfaces)
//! - Interface Description (`if_tsresol`, `if_tsoffset`)
//! - Enhanced Packet and Simple Packet
//!
//! Other blocks are skipped.
//!
//! ## Supported link types
//! - 227 (`LINKTYPE_CAN_SOCKETCAN`): SocketCAN frame, ID word big-endian
//! - 113 (`LINKTYPE_LINUX_SLL`): 16-byte cooked header followed by a
//!   SocketCAN frame in capture-host (little-endian) order
//!
//! Packets on other link types are skipped. Error frames are skipped. CAN FD
//! payloads are truncated to 8 bytes.

use super::FrameSource;
use crate::types::{CanFrame, DecoderError, Result, MAX_CLASSIC_PAYLOAD};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

const SECTION_HEADER_BLOCK: u32 = 0x0A0D_0D0A;
const INTERFACE_DESCRIPTION_BLOCK: u32 = 0x0000_0001;
const SIMPLE_PACKET_BLOCK: u32 = 0x0000_0003;
const ENHANCED_PACKET_BLOCK: u32 = 0x0000_0006;

const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
const BYTE_ORDER_MAGIC_SWAPPED: u32 = 0x4D3C_2B1A;

/// Upper bound on a single block; larger lengths mean a corrupt file
const MAX_BLOCK_LEN: usize = 16 * 1024 * 1024;

const OPT_ENDOFOPT: u16 = 0;
const IF_TSRESOL: u16 = 9;
const IF_TSOFFSET: u16 = 14;

pub const LINKTYPE_LINUX_SLL: u16 = 113;
pub const LINKTYPE_CAN_SOCKETCAN: u16 = 227;

const SLL_HEADER_LEN: usize = 16;
const SOCKETCAN_HEADER_LEN: usize = 8;

const CAN_EFF_FLAG: u32 = 0x8000_0000;
const CAN_RTR_FLAG: u32 = 0x4000_0000;
const CAN_ERR_FLAG: u32 = 0x2000_0000;
const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endianness {
    Little,
    Big,
}

impl Endianness {
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        }
    }

    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        }
    }

    fn i64(self, buf: &[u8]) -> i64 {
        match self {
            Endianness::Little => LittleEndian::read_i64(buf),
            Endianness::Big => BigEndian::read_i64(buf),
        }
    }
}

/// Timestamp unit of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TsResolution {
    /// 10^-n seconds
    Decimal(u8),
    /// 2^-n seconds
    Binary(u8),
}

impl TsResolution {
    fn from_option(value: u8) -> Self {
        if value & 0x80 == 0 {
            TsResolution::Decimal(value)
        } else {
            TsResolution::Binary(value & 0x7F)
        }
    }

    fn to_nanos(self, ticks: u64) -> u64 {
        match self {
            TsResolution::Decimal(exp) if exp <= 9 => {
                ticks.saturating_mul(10u64.pow(9 - u32::from(exp)))
            }
            TsResolution::Decimal(exp) => match 10u128.checked_pow(u32::from(exp) - 9) {
                Some(divisor) => (u128::from(ticks) / divisor) as u64,
                None => 0,
            },
            TsResolution::Binary(exp) => {
                ((u128::from(ticks) * 1_000_000_000) >> exp) as u64
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Interface {
    link_type: u16,
    snap_len: u32,
    resolution: TsResolution,
    /// Seconds added to every timestamp
    offset_secs: i64,
}

impl Interface {
    fn timestamp_ns(&self, ticks: u64) -> u64 {
        let ns = self.resolution.to_nanos(ticks);
        let offset_ns = self.offset_secs.unsigned_abs().saturating_mul(1_000_000_000);
        if self.offset_secs >= 0 {
            ns.saturating_add(offset_ns)
        } else {
            ns.saturating_sub(offset_ns)
        }
    }
}

/// Streaming pcapng reader yielding CAN frames
pub struct PcapngReader<R: Read> {
    reader: R,
    endian: Endianness,
    interfaces: Vec<Interface>,
    seen_section: bool,
    done: bool,
    packets_read: u64,
    packets_skipped: u64,
    warned_link_types: HashSet<u16>,
}

impl PcapngReader<BufReader<File>> {
    /// Open a pcapng file for streaming
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening pcapng capture: {:?}", path);

        let file = File::open(path).map_err(|e| {
            DecoderError::CaptureParseError(format!("Failed to open {:?}: {}", path, e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> PcapngReader<R> {
    /// Wrap a reader positioned at the start of a pcapng stream
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            endian: Endianness::Little,
            interfaces: Vec::new(),
            seen_section: false,
            done: false,
            packets_read: 0,
            packets_skipped: 0,
            warned_link_types: HashSet::new(),
        }
    }

    /// Packet blocks read so far, including skipped ones
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Packets that did not yield a CAN frame
    pub fn packets_skipped(&self) -> u64 {
        self.packets_skipped
    }

    fn next_frame(&mut self) -> Result<Option<CanFrame>> {
        loop {
            let (block_type, body) = match self.read_block()? {
                Some(block) => block,
                None => return Ok(None),
            };

            match block_type {
                SECTION_HEADER_BLOCK => {
                    self.seen_section = true;
                    self.interfaces.clear();
                    log::debug!("Section header ({:?} endian)", self.endian);
                }
                INTERFACE_DESCRIPTION_BLOCK => {
                    let interface = self.parse_interface(&body)?;
                    log::debug!(
                        "Interface {}: link type {}, resolution {:?}",
                        self.interfaces.len(),
                        interface.link_type,
                        interface.resolution
                    );
                    self.interfaces.push(interface);
                }
                ENHANCED_PACKET_BLOCK => {
                    self.packets_read += 1;
                    if let Some(frame) = self.parse_enhanced_packet(&body)? {
                        return Ok(Some(frame));
                    }
                    self.packets_skipped += 1;
                }
                SIMPLE_PACKET_BLOCK => {
                    self.packets_read += 1;
                    if let Some(frame) = self.parse_simple_packet(&body)? {
                        return Ok(Some(frame));
                    }
                    self.packets_skipped += 1;
                }
                other => {
                    log::trace!("Skipping block type 0x{:08X}", other);
                }
            }
        }
    }

    /// Read the next block as (type, body). The body excludes the type, both
    /// length fields and nothing else.
    fn read_block(&mut self) -> Result<Option<(u32, Vec<u8>)>> {
        let mut header = [0u8; 8];
        if !read_full_or_eof(&mut self.reader, &mut header)? {
            return Ok(None);
        }

        // The section header type reads the same in both byte orders
        if LittleEndian::read_u32(&header[0..4]) == SECTION_HEADER_BLOCK {
            let mut magic = [0u8; 4];
            self.reader.read_exact(&mut magic).map_err(truncated)?;
            self.endian = match LittleEndian::read_u32(&magic) {
                BYTE_ORDER_MAGIC => Endianness::Little,
                BYTE_ORDER_MAGIC_SWAPPED => Endianness::Big,
                other => {
                    return Err(DecoderError::CaptureParseError(format!(
                        "Invalid byte-order magic 0x{:08X}",
                        other
                    )))
                }
            };

            let total_len = self.endian.u32(&header[4..8]) as usize;
            check_block_length(total_len, 28)?;

            let mut body = vec![0u8; total_len - 12];
            body[..4].copy_from_slice(&magic);
            self.reader.read_exact(&mut body[4..]).map_err(truncated)?;
            self.read_trailer(total_len)?;
            return Ok(Some((SECTION_HEADER_BLOCK, body)));
        }

        if !self.seen_section {
            return Err(DecoderError::CaptureParseError(
                "Not a pcapng file: missing section header".to_string(),
            ));
        }

        let block_type = self.endian.u32(&header[0..4]);
        let total_len = self.endian.u32(&header[4..8]) as usize;
        check_block_length(total_len, 12)?;

        let mut body = vec![0u8; total_len - 12];
        self.reader.read_exact(&mut body).map_err(truncated)?;
        self.read_trailer(total_len)?;
        Ok(Some((block_type, body)))
    }

    fn read_trailer(&mut self, total_len: usize) -> Result<()> {
        let mut trailer = [0u8; 4];
        self.reader.read_exact(&mut trailer).map_err(truncated)?;
        let trailing_len = self.endian.u32(&trailer) as usize;
        if trailing_len != total_len {
            return Err(DecoderError::CaptureParseError(format!(
                "Block length mismatch: header {} vs trailer {}",
                total_len, trailing_len
            )));
        }
        Ok(())
    }

    fn parse_interface(&self, body: &[u8]) -> Result<Interface> {
        if body.len() < 8 {
            return Err(malformed("interface description block too short"));
        }

        let mut interface = Interface {
            link_type: self.endian.u16(&body[0..2]),
            snap_len: self.endian.u32(&body[4..8]),
            resolution: TsResolution::Decimal(6),
            offset_secs: 0,
        };

        let mut offset = 8;
        while offset + 4 <= body.len() {
            let code = self.endian.u16(&body[offset..offset + 2]);
            let len = self.endian.u16(&body[offset + 2..offset + 4]) as usize;
            offset += 4;
            if code == OPT_ENDOFOPT {
                break;
            }

            let value = body
                .get(offset..offset + len)
                .ok_or_else(|| malformed("interface option overruns block"))?;
            match code {
                IF_TSRESOL if len >= 1 => {
                    interface.resolution = TsResolution::from_option(value[0]);
                }
                IF_TSOFFSET if len >= 8 => {
                    interface.offset_secs = self.endian.i64(&value[0..8]);
                }
                _ => {}
            }
            offset += (len + 3) & !3;
        }

        Ok(interface)
    }

    fn parse_enhanced_packet(&mut self, body: &[u8]) -> Result<Option<CanFrame>> {
        if body.len() < 20 {
            return Err(malformed("enhanced packet block too short"));
        }

        let interface_id = self.endian.u32(&body[0..4]) as usize;
        let ticks = (u64::from(self.endian.u32(&body[4..8])) << 32)
            | u64::from(self.endian.u32(&body[8..12]));
        let captured_len = self.endian.u32(&body[12..16]) as usize;
        let data = body
            .get(20..20 + captured_len)
            .ok_or_else(|| malformed("enhanced packet data overruns block"))?;

        let interface = self.interface(interface_id)?;
        let link_type = interface.link_type;
        let timestamp_ns = interface.timestamp_ns(ticks);
        Ok(self.packet_to_frame(link_type, data, timestamp_ns))
    }

    fn parse_simple_packet(&mut self, body: &[u8]) -> Result<Option<CanFrame>> {
        if body.len() < 4 {
            return Err(malformed("simple packet block too short"));
        }

        let original_len = self.endian.u32(&body[0..4]) as usize;
        let interface = self.interface(0)?;
        let link_type = interface.link_type;
        let mut captured_len = original_len.min(body.len() - 4);
        if interface.snap_len > 0 {
            captured_len = captured_len.min(interface.snap_len as usize);
        }

        // Simple packets carry no timestamp
        Ok(self.packet_to_frame(link_type, &body[4..4 + captured_len], 0))
    }

    fn interface(&self, interface_id: usize) -> Result<&Interface> {
        self.interfaces.get(interface_id).ok_or_else(|| {
            DecoderError::CaptureParseError(format!(
                "Packet references undeclared interface {}",
                interface_id
            ))
        })
    }

    fn packet_to_frame(&mut self, link_type: u16, data: &[u8], timestamp_ns: u64) -> Option<CanFrame> {
        let (frame, id_order) = match link_type {
            LINKTYPE_CAN_SOCKETCAN => (data, Endianness::Big),
            LINKTYPE_LINUX_SLL => {
                if data.len() < SLL_HEADER_LEN {
                    log::debug!("Short SLL packet ({} bytes)", data.len());
                    return None;
                }
                (&data[SLL_HEADER_LEN..], Endianness::Little)
            }
            other => {
                if self.warned_link_types.insert(other) {
                    log::warn!("Skipping packets with unsupported link type {}", other);
                }
                return None;
            }
        };

        if frame.len() < SOCKETCAN_HEADER_LEN {
            log::debug!("Short SocketCAN frame ({} bytes)", frame.len());
            return None;
        }

        let id_word = id_order.u32(&frame[0..4]);
        if id_word & CAN_ERR_FLAG != 0 {
            log::trace!("Skipping error frame 0x{:08X}", id_word);
            return None;
        }

        let dlc = (frame[4] as usize).min(MAX_CLASSIC_PAYLOAD);
        let mut payload = [0u8; MAX_CLASSIC_PAYLOAD];
        let available = (frame.len() - SOCKETCAN_HEADER_LEN).min(dlc);
        payload[..available]
            .copy_from_slice(&frame[SOCKETCAN_HEADER_LEN..SOCKETCAN_HEADER_LEN + available]);

        Some(
            CanFrame::new(
                id_word & CAN_EFF_MASK,
                &payload[..dlc],
                id_word & CAN_EFF_FLAG != 0,
                timestamp_ns,
            )
            .with_remote(id_word & CAN_RTR_FLAG != 0),
        )
    }
}

impl<R: Read> Iterator for PcapngReader<R> {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                log::debug!(
                    "Capture exhausted: {} packets, {} skipped",
                    self.packets_read,
                    self.packets_skipped
                );
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FrameSource for PcapngReader<BufReader<File>> {
    fn open(path: &Path) -> Result<Self> {
        PcapngReader::open(path)
    }

    fn packets_read(&self) -> u64 {
        self.packets_read
    }

    fn packets_skipped(&self) -> u64 {
        self.packets_skipped
    }
}

/// Fill `buf` completely, or return `false` on a clean end of stream.
fn read_full_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(malformed("truncated block header")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn check_block_length(total_len: usize, min_len: usize) -> Result<()> {
    if total_len < min_len || total_len % 4 != 0 || total_len > MAX_BLOCK_LEN {
        return Err(DecoderError::CaptureParseError(format!(
            "Invalid block length {}",
            total_len
        )));
    }
    Ok(())
}

fn truncated(err: std::io::Error) -> DecoderError {
    if err.kind() == ErrorKind::UnexpectedEof {
        malformed("truncated block")
    } else {
        DecoderError::IoError(err)
    }
}

fn malformed(what: &str) -> DecoderError {
    DecoderError::CaptureParseError(what.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds pcapng byte streams block by block
    pub(crate) struct CaptureBuilder {
        big_endian: bool,
        bytes: Vec<u8>,
    }

    impl CaptureBuilder {
        pub(crate) fn new(big_endian: bool) -> Self {
            let mut builder = Self {
                big_endian,
                bytes: Vec::new(),
            };
            builder.section_header();
            builder
        }

        fn put_u16(&self, out: &mut Vec<u8>, v: u16) {
            if self.big_endian {
                out.extend_from_slice(&v.to_be_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }

        fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
            if self.big_endian {
                out.extend_from_slice(&v.to_be_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }

        pub(crate) fn block(&mut self, block_type: u32, body: &[u8]) -> &mut Self {
            let mut padded = body.to_vec();
            padded.resize((body.len() + 3) & !3, 0);
            let total = (padded.len() + 12) as u32;

            let mut out = Vec::new();
            self.put_u32(&mut out, block_type);
            self.put_u32(&mut out, total);
            out.extend_from_slice(&padded);
            self.put_u32(&mut out, total);
            self.bytes.extend_from_slice(&out);
            self
        }

        pub(crate) fn section_header(&mut self) -> &mut Self {
            let mut body = Vec::new();
            self.put_u32(&mut body, BYTE_ORDER_MAGIC);
            self.put_u16(&mut body, 1);
            self.put_u16(&mut body, 0);
            body.extend_from_slice(&[0xFF; 8]);
            self.block(SECTION_HEADER_BLOCK, &body)
        }

        pub(crate) fn interface(&mut self, link_type: u16, tsresol: Option<u8>) -> &mut Self {
            let mut body = Vec::new();
            self.put_u16(&mut body, link_type);
            self.put_u16(&mut body, 0);
            self.put_u32(&mut body, 0x0004_0000);
            if let Some(resolution) = tsresol {
                self.put_u16(&mut body, IF_TSRESOL);
                self.put_u16(&mut body, 1);
                body.extend_from_slice(&[resolution, 0, 0, 0]);
                self.put_u16(&mut body, OPT_ENDOFOPT);
                self.put_u16(&mut body, 0);
            }
            self.block(INTERFACE_DESCRIPTION_BLOCK, &body)
        }

        pub(crate) fn enhanced_packet(&mut self, interface: u32, ticks: u64, data: &[u8]) -> &mut Self {
            let mut body = Vec::new();
            self.put_u32(&mut body, interface);
            self.put_u32(&mut body, (ticks >> 32) as u32);
            self.put_u32(&mut body, ticks as u32);
            self.put_u32(&mut body, data.len() as u32);
            self.put_u32(&mut body, data.len() as u32);
            body.extend_from_slice(data);
            self.block(ENHANCED_PACKET_BLOCK, &body)
        }

        pub(crate) fn simple_packet(&mut self, data: &[u8]) -> &mut Self {
            let mut body = Vec::new();
            self.put_u32(&mut body, data.len() as u32);
            body.extend_from_slice(data);
            self.block(SIMPLE_PACKET_BLOCK, &body)
        }

        pub(crate) fn build(&self) -> Vec<u8> {
            self.bytes.clone()
        }
    }

    /// SocketCAN frame as captured on link type 227
    pub(crate) fn socketcan(id_word: u32, data: &[u8]) -> Vec<u8> {
        let mut out = id_word.to_be_bytes().to_vec();
        out.extend_from_slice(&[data.len() as u8, 0, 0, 0]);
        out.extend_from_slice(data);
        out
    }

    fn read_all(bytes: Vec<u8>) -> Vec<Result<CanFrame>> {
        PcapngReader::new(Cursor::new(bytes)).collect()
    }

    fn frames(bytes: Vec<u8>) -> Vec<CanFrame> {
        read_all(bytes).into_iter().map(|f| f.unwrap()).collect()
    }

    #[test]
    fn test_socketcan_frames_little_endian_section() {
        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .enhanced_packet(0, 1_500_000, &socketcan(0x123, &[1, 2, 3]))
            .enhanced_packet(0, 1_500_001, &socketcan(CAN_EFF_FLAG | 0x18FE_F100, &[0xAA; 8]))
            .enhanced_packet(0, 1_500_002, &socketcan(CAN_RTR_FLAG | 0x100, &[]))
            .enhanced_packet(0, 1_500_003, &socketcan(CAN_ERR_FLAG | 0x004, &[0; 8]))
            .build();

        let mut reader = PcapngReader::new(Cursor::new(bytes));
        let frames: Vec<CanFrame> = (&mut reader).map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].can_id, 0x123);
        assert_eq!(frames[0].data, vec![1, 2, 3]);
        assert!(!frames[0].is_extended);
        // Default resolution is microseconds
        assert_eq!(frames[0].timestamp_ns, 1_500_000_000);

        assert_eq!(frames[1].can_id, 0x18FE_F100);
        assert!(frames[1].is_extended);

        assert_eq!(frames[2].can_id, 0x100);
        assert!(frames[2].is_remote);

        assert_eq!(reader.packets_read(), 4);
        assert_eq!(reader.packets_skipped(), 1);
    }

    #[test]
    fn test_big_endian_section_with_nanosecond_resolution() {
        let bytes = CaptureBuilder::new(true)
            .interface(LINKTYPE_CAN_SOCKETCAN, Some(9))
            .enhanced_packet(0, 1_700_000_000_123_456_789, &socketcan(0x7FF, &[0x10, 0x20]))
            .build();

        let frames = frames(bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].can_id, 0x7FF);
        assert_eq!(frames[0].timestamp_ns, 1_700_000_000_123_456_789);
    }

    #[test]
    fn test_binary_timestamp_resolution() {
        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, Some(0x80 | 10))
            .enhanced_packet(0, 1024 * 3, &socketcan(0x10, &[]))
            .build();

        assert_eq!(frames(bytes)[0].timestamp_ns, 3_000_000_000);
    }

    #[test]
    fn test_linux_sll_link_type() {
        let mut packet = vec![0u8; SLL_HEADER_LEN];
        packet[14..16].copy_from_slice(&0x000Cu16.to_be_bytes());
        packet.extend_from_slice(&(CAN_EFF_FLAG | 0x1234_5678).to_le_bytes());
        packet.extend_from_slice(&[2, 0, 0, 0, 0xDE, 0xAD]);

        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_LINUX_SLL, None)
            .enhanced_packet(0, 0, &packet)
            .build();

        let frames = frames(bytes);
        assert_eq!(frames[0].can_id, 0x1234_5678);
        assert!(frames[0].is_extended);
        assert_eq!(frames[0].data, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_oversized_dlc_is_clamped() {
        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .enhanced_packet(0, 0, &socketcan(0x200, &[0x55; 64]))
            .build();

        assert_eq!(frames(bytes)[0].data, vec![0x55; 8]);
    }

    #[test]
    fn test_unsupported_link_type_skipped() {
        let bytes = CaptureBuilder::new(false)
            .interface(1, None)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .enhanced_packet(0, 0, &[0u8; 60])
            .enhanced_packet(1, 0, &socketcan(0x42, &[9]))
            .build();

        let frames = frames(bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].can_id, 0x42);
    }

    #[test]
    fn test_simple_packet_uses_first_interface() {
        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .simple_packet(&socketcan(0x321, &[7, 7]))
            .build();

        let frames = frames(bytes);
        assert_eq!(frames[0].can_id, 0x321);
        assert_eq!(frames[0].timestamp_ns, 0);
    }

    #[test]
    fn test_new_section_resets_interfaces() {
        let bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .section_header()
            .enhanced_packet(0, 0, &socketcan(0x1, &[]))
            .build();

        let results = read_all(bytes);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DecoderError::CaptureParseError(_))));
    }

    #[test]
    fn test_truncated_capture_reports_error_once() {
        let mut bytes = CaptureBuilder::new(false)
            .interface(LINKTYPE_CAN_SOCKETCAN, None)
            .enhanced_packet(0, 0, &socketcan(0x1, &[1]))
            .enhanced_packet(0, 1, &socketcan(0x2, &[2]))
            .build();
        bytes.truncate(bytes.len() - 6);

        let results = read_all(bytes);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().can_id, 0x1);
        assert!(matches!(results[1], Err(DecoderError::CaptureParseError(_))));
    }

    #[test]
    fn test_rejects_non_pcapng_input() {
        let results = read_all(b"this is not a capture file at all".to_vec());
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(read_all(Vec::new()).is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let result = PcapngReader::open(Path::new("/nonexistent/capture.pcapng"));
        assert!(matches!(result, Err(DecoderError::CaptureParseError(_))));
    }
}
