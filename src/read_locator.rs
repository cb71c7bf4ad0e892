use crate::chunk::ChunkLocationInfo;
use crate::config::{LocatorConfig, ReadProtocol};
use crate::error::{LocatorError, Result};
use crate::legacy;
use crate::master::MasterClient;
use crate::status::{Status, ERROR_ENOENT, ERROR_IO};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

const MASTER_ERROR: &str = "Chunk locator: error sent by master server";
const MALFORMED_LIST: &str = "Chunk locator: malformed chunkserver list sent by master server";

struct CachedLocation {
    inode: u32,
    index: u32,
    info: Arc<ChunkLocationInfo>,
}

impl CachedLocation {
    fn matches(&self, inode: u32, index: u32) -> bool {
        self.inode == inode && self.index == index
    }
}

/// Resolves chunks for reading and remembers the last resolution.
///
/// Only one (inode, index) entry is cached. Repeated reads of the same block
/// skip the master; anything else replaces the entry. The master call runs
/// without the lock held, so concurrent misses are not coalesced and the last
/// one to finish wins the slot.
pub struct ReadChunkLocator {
    master: Arc<dyn MasterClient>,
    protocol: ReadProtocol,
    cache: Mutex<Option<CachedLocation>>,
}

impl ReadChunkLocator {
    pub fn new(master: Arc<dyn MasterClient>, config: &LocatorConfig) -> Self {
        Self {
            master,
            protocol: config.read_protocol,
            cache: Mutex::new(None),
        }
    }

    // the slot is replaced in one assignment, so a poisoned lock still guards a whole entry
    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedLocation>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the cached entry if, and only if, it is for (inode, index).
    pub fn invalidate_cache(&self, inode: u32, index: u32) {
        let mut cache = self.lock_cache();
        if cache.as_ref().is_some_and(|c| c.matches(inode, index)) {
            debug!("invalidate cached location inode={} index={}", inode, index);
            *cache = None;
        }
    }

    pub fn locate_chunk(&self, inode: u32, index: u32) -> Result<Arc<ChunkLocationInfo>> {
        if let Some(info) = self.cached(inode, index) {
            debug!("location cache hit inode={} index={}", inode, index);
            return Ok(info);
        }

        let started = Instant::now();
        let resolved = self.resolve(inode, index);
        debug!(
            "read_chunk inode={} index={} took {:?}",
            inode,
            index,
            started.elapsed()
        );
        let info = Arc::new(resolved?);

        let mut cache = self.lock_cache();
        *cache = Some(CachedLocation {
            inode,
            index,
            info: info.clone(),
        });
        debug!(
            "cached location inode={} index={} chunk_id={} version={}",
            inode, index, info.chunk_id, info.version
        );
        Ok(info)
    }

    fn cached(&self, inode: u32, index: u32) -> Option<Arc<ChunkLocationInfo>> {
        self.lock_cache()
            .as_ref()
            .filter(|c| c.matches(inode, index))
            .map(|c| c.info.clone())
    }

    fn resolve(&self, inode: u32, index: u32) -> Result<ChunkLocationInfo> {
        match self.protocol {
            ReadProtocol::Modern => {
                let reply = self
                    .master
                    .read_chunk(inode, index)
                    .map_err(|status| master_error(inode, index, status))?;
                Ok(ChunkLocationInfo::new(
                    reply.chunk_id,
                    reply.version,
                    reply.file_length,
                    reply.locations,
                ))
            }
            ReadProtocol::Legacy => {
                let reply = self
                    .master
                    .legacy_read_chunk(inode, index)
                    .map_err(|status| master_error(inode, index, status))?;
                let locations = legacy::decode_chunkservers(&reply.chunkservers).map_err(|err| {
                    warn!(
                        "chunkserver list for inode={} index={} is malformed: {}",
                        inode, index, err
                    );
                    LocatorError::Recoverable {
                        context: MALFORMED_LIST,
                        status: ERROR_IO,
                    }
                })?;
                Ok(ChunkLocationInfo::new(
                    reply.chunk_id,
                    reply.version,
                    reply.file_length,
                    locations,
                ))
            }
        }
    }
}

fn master_error(inode: u32, index: u32, status: Status) -> LocatorError {
    warn!(
        "read_chunk inode={} index={} failed with status {}",
        inode, index, status
    );
    if status == ERROR_ENOENT {
        LocatorError::Unrecoverable {
            context: MASTER_ERROR,
            status,
        }
    } else {
        LocatorError::Recoverable {
            context: MASTER_ERROR,
            status,
        }
    }
}
