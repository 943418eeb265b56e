//! DBC + pcapng capture in, MCAP out, read back with the mcap crate.

use can_mcap_decoder::{
    ContainerWriter, Decoder, McapSink, RawValue, SignalRecord, WriterConfig,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tempfile::{tempdir, NamedTempFile};

const DBC: &str = r#"VERSION ""

NS_ :
    VAL_

BS_:

BU_: ECU1 ECU2

BO_ 256 Vehicle: 8 ECU1
 SG_ Speed : 0|16@1+ (0.01,0) [0|300] "km/h" ECU2

BO_ 512 Status: 8 ECU1
 SG_ Flags : 0|8@1+ (1,0) [0|255] "" ECU2

BO_ 768 Mux: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU2
 SG_ A m0 : 8|8@1+ (1,0) [0|255] "" ECU2
 SG_ B m1 : 16|8@1+ (1,0) [0|255] "bar" ECU2

BO_ 2364539904 EEC1: 8 ECU1
 SG_ Rpm : 7|16@0+ (0.125,0) [0|8031.875] "rpm" ECU2

VAL_ 768 Mode 0 "Idle" 1 "Active" ;
"#;

const EFF: u32 = 0x8000_0000;
const ERR: u32 = 0x2000_0000;

/// Minimal little-endian pcapng writer: one SocketCAN interface with
/// nanosecond timestamps.
struct Capture(Vec<u8>);

impl Capture {
    fn new() -> Self {
        let mut capture = Capture(Vec::new());

        let mut shb = Vec::new();
        shb.extend_from_slice(&0x1A2B_3C4Du32.to_le_bytes());
        shb.extend_from_slice(&1u16.to_le_bytes());
        shb.extend_from_slice(&0u16.to_le_bytes());
        shb.extend_from_slice(&[0xFF; 8]);
        capture.block(0x0A0D_0D0A, &shb);

        let mut idb = Vec::new();
        idb.extend_from_slice(&227u16.to_le_bytes());
        idb.extend_from_slice(&0u16.to_le_bytes());
        idb.extend_from_slice(&0x0004_0000u32.to_le_bytes());
        // if_tsresol = 9 (nanoseconds), then end of options
        idb.extend_from_slice(&9u16.to_le_bytes());
        idb.extend_from_slice(&1u16.to_le_bytes());
        idb.extend_from_slice(&[9, 0, 0, 0]);
        idb.extend_from_slice(&[0, 0, 0, 0]);
        capture.block(1, &idb);

        capture
    }

    fn block(&mut self, block_type: u32, body: &[u8]) {
        let mut padded = body.to_vec();
        padded.resize((body.len() + 3) & !3, 0);
        let total = (padded.len() + 12) as u32;
        self.0.extend_from_slice(&block_type.to_le_bytes());
        self.0.extend_from_slice(&total.to_le_bytes());
        self.0.extend_from_slice(&padded);
        self.0.extend_from_slice(&total.to_le_bytes());
    }

    fn frame(mut self, timestamp_ns: u64, id_word: u32, data: &[u8]) -> Self {
        let mut packet = id_word.to_be_bytes().to_vec();
        packet.extend_from_slice(&[data.len() as u8, 0, 0, 0]);
        packet.extend_from_slice(data);

        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&((timestamp_ns >> 32) as u32).to_le_bytes());
        epb.extend_from_slice(&(timestamp_ns as u32).to_le_bytes());
        epb.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        epb.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        epb.extend_from_slice(&packet);
        self.block(6, &epb);
        self
    }

    fn write_to(&self, path: &Path) {
        std::fs::write(path, &self.0).unwrap();
    }
}

const T0: u64 = 1_700_000_000_000_000_000;

fn write_dbc() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DBC.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_capture_to_mcap() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempdir().unwrap();
    let capture_path = dir.path().join("drive.pcapng");
    let mcap_path = dir.path().join("mcap").join("drive.mcap");

    Capture::new()
        // 1000 * 0.01 = 10 km/h
        .frame(T0, 0x100, &[0xE8, 0x03, 0, 0, 0, 0, 0, 0])
        // Not in the dictionary
        .frame(T0 + 1_000, 0x101, &[0; 8])
        // Declared length is 8
        .frame(T0 + 2_000, 0x200, &[1, 2, 3, 4])
        // Mode = 1 selects B, not A
        .frame(T0 + 3_000, 0x300, &[1, 0x11, 0x22, 0, 0, 0, 0, 0])
        // Motorola 0x1F40 = 8000 * 0.125 = 1000 rpm
        .frame(T0 + 4_000, EFF | 0x0CF0_0400, &[0x1F, 0x40, 0, 0, 0, 0, 0, 0])
        // Error frames never reach the decoder
        .frame(T0 + 5_000, ERR | 0x04, &[0; 8])
        .frame(T0 + 6_000, 0x100, &[0xD0, 0x07, 0, 0, 0, 0, 0, 0])
        .write_to(&capture_path);

    let dbc = write_dbc();
    let mut decoder = Decoder::new();
    decoder.add_dbc(dbc.path()).unwrap();
    assert_eq!(decoder.database_stats().num_messages, 4);

    let config = WriterConfig::default();
    let sink = McapSink::create(&mcap_path, &config).unwrap();
    let writer = ContainerWriter::new(sink, &config).unwrap();

    let stats = decoder
        .convert_file(&capture_path, &writer, &AtomicBool::new(false))
        .unwrap();
    writer.close().unwrap();
    writer.close().unwrap();

    assert_eq!(stats.frames_read, 6);
    assert_eq!(stats.frames_decoded, 4);
    assert_eq!(stats.unknown_frames, 1);
    assert_eq!(stats.shape_mismatches, 1);
    assert_eq!(stats.signals_written, 5);
    assert_eq!(stats.channels_created, 4);
    assert_eq!(stats.first_timestamp_ns, Some(T0));
    assert_eq!(stats.last_timestamp_ns, Some(T0 + 6_000));

    let bytes = std::fs::read(&mcap_path).unwrap();
    let messages: Vec<_> = mcap::MessageStream::new(&bytes)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(messages.len(), 5);

    let mut topics: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for message in &messages {
        let channel = &message.channel;
        assert_eq!(channel.message_encoding, "json");
        let schema = channel.schema.as_ref().unwrap();
        assert_eq!(schema.name, "candecode.DecodedSignal");
        assert_eq!(schema.encoding, "jsonschema");
        assert_eq!(message.log_time, message.publish_time);
        topics.insert(channel.topic.clone(), channel.metadata.clone());
    }

    let names: Vec<&str> = topics.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["/can/EEC1/Rpm", "/can/Mux/B", "/can/Mux/Mode", "/can/Vehicle/Speed"]
    );

    let rpm = &topics["/can/EEC1/Rpm"];
    assert_eq!(rpm["can_id"], "0xCF00400");
    assert_eq!(rpm["is_extended"], "true");
    assert_eq!(rpm["unit"], "rpm");

    let mode = &topics["/can/Mux/Mode"];
    assert_eq!(mode["can_id"], "0x300");
    assert_eq!(mode["is_extended"], "false");
    assert!(!mode.contains_key("unit"));

    let records: Vec<(u64, SignalRecord)> = messages
        .iter()
        .map(|m| (m.log_time, serde_json::from_slice(&m.data).unwrap()))
        .collect();

    let speeds: Vec<&(u64, SignalRecord)> =
        records.iter().filter(|(_, r)| r.signal == "Speed").collect();
    assert_eq!(speeds.len(), 2);
    assert_eq!(speeds[0].0, T0);
    assert_eq!(speeds[0].1.raw, RawValue::Unsigned(1000));
    assert!((speeds[0].1.physical.unwrap() - 10.0).abs() < 1e-9);
    assert_eq!(speeds[1].0, T0 + 6_000);

    let mode = records.iter().find(|(_, r)| r.signal == "Mode").unwrap();
    assert_eq!(mode.1.description.as_deref(), Some("Active"));

    let b = records.iter().find(|(_, r)| r.signal == "B").unwrap();
    assert_eq!(b.1.raw, RawValue::Unsigned(0x22));
    assert_eq!(b.1.unit.as_deref(), Some("bar"));

    let rpm = records.iter().find(|(_, r)| r.signal == "Rpm").unwrap();
    assert_eq!(rpm.0, T0 + 4_000);
    assert_eq!(rpm.1.can_id, 0x0CF0_0400);
    assert!((rpm.1.physical.unwrap() - 1000.0).abs() < 1e-9);
}

#[test]
fn test_truncated_capture_fails_conversion() {
    let dir = tempdir().unwrap();
    let capture_path = dir.path().join("broken.pcapng");

    let mut capture = Capture::new().frame(T0, 0x100, &[0; 8]);
    capture.0.truncate(capture.0.len() - 3);
    capture.write_to(&capture_path);

    let dbc = write_dbc();
    let mut decoder = Decoder::new();
    decoder.add_dbc(dbc.path()).unwrap();

    let config = WriterConfig::default();
    let sink = McapSink::create(&dir.path().join("broken.mcap"), &config).unwrap();
    let writer = ContainerWriter::new(sink, &config).unwrap();

    let result = decoder.convert_file(&capture_path, &writer, &AtomicBool::new(false));
    assert!(result.is_err());
    writer.close().unwrap();
}
