//! Capture file readers
//!
//! Each reader is an iterator over CanFrame objects.

use crate::types::{CanFrame, DecoderError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod pcapng;

pub use pcapng::PcapngReader;

/// Common trait for all capture readers
pub trait FrameSource: Iterator<Item = Result<CanFrame>> {
    /// Open a capture file and return an iterator over CAN frames
    fn open(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Packets read from the capture, including skipped ones
    fn packets_read(&self) -> u64;

    /// Packets that did not yield a CAN frame
    fn packets_skipped(&self) -> u64;
}

/// Open a capture file, choosing the reader from the file extension.
///
/// Files without a recognized extension are tried as pcapng; the reader
/// rejects anything without a section header.
pub fn open_capture(path: &Path) -> Result<Box<dyn FrameSource>> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("pcap") | Some("cap") => Err(DecoderError::CaptureParseError(format!(
            "Classic pcap is not supported, convert {:?} to pcapng first",
            path
        ))),
        Some("pcapng") => {
            log::debug!("Detected pcapng capture");
            open_boxed::<PcapngReader<BufReader<File>>>(path)
        }
        other => {
            log::debug!("Unrecognized capture extension {:?}, trying pcapng", other);
            open_boxed::<PcapngReader<BufReader<File>>>(path)
        }
    }
}

fn open_boxed<R: FrameSource + 'static>(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(R::open(path)?))
}
