use crate::chunk::ChunkLocations;
use crate::status::Status;
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
pub mod loopback;

/// Synchronous calls the locators make against the metadata master.
///
/// A call runs to completion before it returns. Transport failures are
/// reported as `ERROR_IO`, the same way the master reports its own I/O errors.
pub trait MasterClient: Send + Sync {
    /// Resolves a chunk for reading, structured reply.
    fn read_chunk(&self, inode: u32, index: u32) -> Result<ReadChunkReply, Status>;
    /// Resolves a chunk for reading, flat chunkserver list reply.
    fn legacy_read_chunk(&self, inode: u32, index: u32) -> Result<LegacyReadChunkReply, Status>;
    /// Locks a chunk for writing, or renews the lock named in the request.
    fn write_chunk(&self, request: &WriteChunkRequest) -> WriteChunkReply;
    /// Ends a write session and reports the resulting file length.
    fn write_end(&self, chunk_id: u64, lock_id: u32, inode: u32, file_length: u64) -> Status;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadChunkReply {
    pub chunk_id: u64,
    pub version: u32,
    pub file_length: u64,
    pub locations: ChunkLocations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyReadChunkReply {
    pub chunk_id: u64,
    pub version: u32,
    pub file_length: u64,
    /// Packed 6-byte (ip, port) records, see `crate::legacy`.
    pub chunkservers: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteChunkRequest {
    pub inode: u32,
    pub index: u32,
    /// 0 asks for a new lock, anything else renews that lock.
    pub lock_id: u32,
    pub file_length: u64,
    pub chunk_id: u64,
    pub version: u32,
}

/// Reply to `write_chunk`.
///
/// The fields are meaningful even when `status` is not OK: the locator keeps
/// whatever lock id the master handed back so that a retry can reuse it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteChunkReply {
    pub status: Status,
    pub lock_id: u32,
    pub chunk_id: u64,
    pub version: u32,
    pub file_length: u64,
    pub locations: ChunkLocations,
}

impl WriteChunkReply {
    /// A failed reply that echoes the request's session fields back.
    pub fn failed(status: Status, request: &WriteChunkRequest) -> Self {
        Self {
            status,
            lock_id: request.lock_id,
            chunk_id: request.chunk_id,
            version: request.version,
            file_length: request.file_length,
            locations: ChunkLocations::new(),
        }
    }
}
