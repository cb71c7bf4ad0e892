//! Chunk location for a distributed filesystem client.
//!
//! `ReadChunkLocator` turns (inode, index) into the chunkservers holding that
//! block and caches the last answer. `WriteChunkLocator` additionally takes
//! the master's write lock on the chunk and releases it when the write ends.
//! Both talk to the master through `MasterClient`.

pub mod chunk;
pub mod config;
pub mod error;
pub mod legacy;
pub mod master;
pub mod read_locator;
pub mod status;
pub mod write_locator;

pub use chunk::{ChunkLocationInfo, ChunkLocations, ChunkType, ChunkTypeWithAddress, NetworkAddress};
pub use config::{LocatorConfig, ReadProtocol};
pub use error::LocatorError;
pub use master::MasterClient;
pub use read_locator::ReadChunkLocator;
pub use status::Status;
pub use write_locator::WriteChunkLocator;
