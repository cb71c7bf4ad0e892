use core::fmt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;

pub type NetworkAddress = SocketAddrV4;

/// Kind of replica a chunkserver holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkType {
    /// Full copy of the chunk.
    #[default]
    Standard,
    /// One part of an xor-coded chunk, `part == 0` being the parity.
    Xor { level: u8, part: u8 },
}

impl ChunkType {
    pub fn is_standard(&self) -> bool {
        matches!(self, ChunkType::Standard)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkType::Standard => write!(f, "standard"),
            ChunkType::Xor { level, part: 0 } => write!(f, "xor{}_parity", level),
            ChunkType::Xor { level, part } => write!(f, "xor{}_part{}", level, part),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkTypeWithAddress {
    pub address: NetworkAddress,
    pub chunk_type: ChunkType,
}

impl ChunkTypeWithAddress {
    pub fn new(address: NetworkAddress, chunk_type: ChunkType) -> Self {
        Self {
            address,
            chunk_type,
        }
    }
}

pub type ChunkLocations = Vec<ChunkTypeWithAddress>;

/// Where a chunk lives, as the master reported it.
///
/// Once handed out behind an `Arc` the value is never modified; a newer
/// resolution replaces the whole handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLocationInfo {
    pub chunk_id: u64,
    pub version: u32,
    pub file_length: u64,
    pub locations: ChunkLocations,
}

impl ChunkLocationInfo {
    pub fn new(chunk_id: u64, version: u32, file_length: u64, locations: ChunkLocations) -> Self {
        Self {
            chunk_id,
            version,
            file_length,
            locations,
        }
    }

    /// A hole in the file: no chunk has been written at this index yet.
    pub fn is_empty_chunk(&self) -> bool {
        self.chunk_id == 0
    }
}
