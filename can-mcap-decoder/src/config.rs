//! Writer configuration types
//!
//! This module defines the configuration of the MCAP output: topic naming,
//! chunking and compression. Input selection and logging belong to the
//! application layer.

use serde::{Deserialize, Serialize};

/// Configuration for the container writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// First topic segment: channels are named `/<prefix>/<message>/<signal>`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Chunk compression
    #[serde(default)]
    pub compression: Compression,

    /// Target uncompressed chunk size in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Name of the schema record shared by every channel
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
}

fn default_topic_prefix() -> String {
    "can".to_string()
}

fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_schema_name() -> String {
    "candecode.DecodedSignal".to_string()
}

/// Chunk compression algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Lz4,
    None,
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(Compression::Zstd),
            "lz4" => Ok(Compression::Lz4),
            "none" => Ok(Compression::None),
            other => Err(format!("unknown compression '{}' (expected zstd, lz4 or none)", other)),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
            compression: Compression::default(),
            chunk_size: default_chunk_size(),
            schema_name: default_schema_name(),
        }
    }
}

impl WriterConfig {
    /// Create a new writer configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Builder method: set chunk compression
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Builder method: set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Topic prefix without surrounding slashes; falls back to the default
    /// when nothing is left.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.topic_prefix.trim_matches('/');
        if trimmed.is_empty() {
            default_topic_prefix()
        } else {
            trimmed.to_string()
        }
    }
}
