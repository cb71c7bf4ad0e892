use crate::chunk::ChunkLocationInfo;
use crate::error::{LocatorError, Result};
use crate::master::{MasterClient, WriteChunkRequest};
use crate::status::{
    Status, ERROR_CHUNKBUSY, ERROR_CHUNKLOST, ERROR_IO, ERROR_LOCKED, ERROR_NOCHUNKSERVERS,
    STATUS_OK,
};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;

const MASTER_ERROR: &str = "error sent by master server";
const WRITE_END_FAILED: &str = "Sending WRITE_END to the master failed";

/// Conditions under which the master may grant the lock on a later attempt.
fn is_transient(status: Status) -> bool {
    matches!(
        status,
        ERROR_IO | ERROR_NOCHUNKSERVERS | ERROR_LOCKED | ERROR_CHUNKBUSY | ERROR_CHUNKLOST
    )
}

/// Holds the write lock on one chunk at a time.
///
/// A session starts with the first successful `locate_and_lock_chunk` and ends
/// with `unlock_chunk`. Locking a different chunk while a session is open is a
/// caller bug and panics.
pub struct WriteChunkLocator {
    master: Arc<dyn MasterClient>,
    inode: u32,
    index: u32,
    lock_id: u32,
    location_info: Arc<ChunkLocationInfo>,
}

impl WriteChunkLocator {
    pub fn new(master: Arc<dyn MasterClient>) -> Self {
        Self {
            master,
            inode: 0,
            index: 0,
            lock_id: 0,
            location_info: Arc::new(ChunkLocationInfo::default()),
        }
    }

    pub fn inode(&self) -> u32 {
        self.inode
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn lock_id(&self) -> u32 {
        self.lock_id
    }

    pub fn is_locked(&self) -> bool {
        self.lock_id != 0
    }

    pub fn location_info(&self) -> Arc<ChunkLocationInfo> {
        self.location_info.clone()
    }

    /// Records the file length after data was written through this session.
    pub fn set_file_length(&mut self, file_length: u64) {
        let mut info = (*self.location_info).clone();
        info.file_length = file_length;
        self.location_info = Arc::new(info);
    }

    /// Locks (inode, index), or renews the lock if this session already holds it.
    ///
    /// On a renewal the file length tracked by the session is kept, whatever
    /// the master reports. Recoverable failures leave the lock id the master
    /// returned in place; unrecoverable ones drop it.
    pub fn locate_and_lock_chunk(&mut self, inode: u32, index: u32) -> Result<()> {
        assert!(
            self.lock_id == 0 || (self.inode == inode && self.index == index),
            "chunk inode={} index={} is still locked (lock_id={}), cannot lock inode={} index={}",
            self.inode,
            self.index,
            self.lock_id,
            inode,
            index
        );
        self.inode = inode;
        self.index = index;
        let old_lock_id = self.lock_id;
        let old_info = self.location_info.clone();
        self.location_info = Arc::new(ChunkLocationInfo::new(
            old_info.chunk_id,
            old_info.version,
            old_info.file_length,
            Vec::new(),
        ));

        let request = WriteChunkRequest {
            inode,
            index,
            lock_id: old_lock_id,
            file_length: old_info.file_length,
            chunk_id: old_info.chunk_id,
            version: old_info.version,
        };
        let started = Instant::now();
        let reply = self.master.write_chunk(&request);
        debug!(
            "write_chunk inode={} index={} lock_id={} took {:?}",
            inode,
            index,
            old_lock_id,
            started.elapsed()
        );

        self.lock_id = reply.lock_id;
        let file_length = if old_lock_id != 0 {
            old_info.file_length
        } else {
            reply.file_length
        };
        self.location_info = Arc::new(ChunkLocationInfo::new(
            reply.chunk_id,
            reply.version,
            file_length,
            reply.locations,
        ));

        match reply.status {
            STATUS_OK => {
                debug!(
                    "locked chunk_id={} version={} inode={} index={} lock_id={}",
                    reply.chunk_id, reply.version, inode, index, self.lock_id
                );
                Ok(())
            }
            status if is_transient(status) => {
                warn!(
                    "write_chunk inode={} index={} failed with status {}, may retry",
                    inode, index, status
                );
                Err(LocatorError::Recoverable {
                    context: MASTER_ERROR,
                    status,
                })
            }
            status => {
                warn!(
                    "write_chunk inode={} index={} failed with status {}, dropping lock",
                    inode, index, status
                );
                self.lock_id = 0;
                Err(LocatorError::Unrecoverable {
                    context: MASTER_ERROR,
                    status,
                })
            }
        }
    }

    /// Ends the session on the master.
    ///
    /// An I/O failure keeps the lock so the unlock can be retried. Any status
    /// the master itself returns ends the session locally.
    pub fn unlock_chunk(&mut self) -> Result<()> {
        assert_ne!(self.lock_id, 0, "unlock_chunk called without a locked chunk");
        let started = Instant::now();
        let status = self.master.write_end(
            self.location_info.chunk_id,
            self.lock_id,
            self.inode,
            self.location_info.file_length,
        );
        debug!(
            "write_end chunk_id={} lock_id={} took {:?}",
            self.location_info.chunk_id,
            self.lock_id,
            started.elapsed()
        );
        if status == ERROR_IO {
            warn!(
                "write_end chunk_id={} lock_id={} could not reach the master",
                self.location_info.chunk_id, self.lock_id
            );
            return Err(LocatorError::Recoverable {
                context: WRITE_END_FAILED,
                status,
            });
        }
        self.lock_id = 0;
        if status != STATUS_OK {
            warn!(
                "write_end chunk_id={} failed with status {}",
                self.location_info.chunk_id, status
            );
            return Err(LocatorError::Unrecoverable {
                context: WRITE_END_FAILED,
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::{ChunkType, ChunkTypeWithAddress};
    use crate::master::{LegacyReadChunkReply, ReadChunkReply, WriteChunkReply};
    use crate::status::{ERROR_ENOENT, ERROR_NOTLOCKED, ERROR_QUOTA};
    use std::collections::VecDeque;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::Mutex;

    /// Answers write calls from a script and records what was sent.
    #[derive(Default)]
    struct ScriptedMaster {
        write_replies: Mutex<VecDeque<WriteChunkReply>>,
        end_replies: Mutex<VecDeque<Status>>,
        requests: Mutex<Vec<WriteChunkRequest>>,
        ends: Mutex<Vec<(u64, u32, u32, u64)>>,
    }

    impl ScriptedMaster {
        fn push_write(&self, reply: WriteChunkReply) {
            self.write_replies.lock().unwrap().push_back(reply);
        }

        fn push_end(&self, status: Status) {
            self.end_replies.lock().unwrap().push_back(status);
        }
    }

    impl MasterClient for ScriptedMaster {
        fn read_chunk(&self, _inode: u32, _index: u32) -> std::result::Result<ReadChunkReply, Status> {
            Err(ERROR_IO)
        }

        fn legacy_read_chunk(
            &self,
            _inode: u32,
            _index: u32,
        ) -> std::result::Result<LegacyReadChunkReply, Status> {
            Err(ERROR_IO)
        }

        fn write_chunk(&self, request: &WriteChunkRequest) -> WriteChunkReply {
            self.requests.lock().unwrap().push(request.clone());
            self.write_replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected write_chunk call")
        }

        fn write_end(&self, chunk_id: u64, lock_id: u32, inode: u32, file_length: u64) -> Status {
            self.ends
                .lock()
                .unwrap()
                .push((chunk_id, lock_id, inode, file_length));
            self.end_replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected write_end call")
        }
    }

    fn granted(lock_id: u32, file_length: u64) -> WriteChunkReply {
        WriteChunkReply {
            status: STATUS_OK,
            lock_id,
            chunk_id: 7,
            version: 2,
            file_length,
            locations: vec![ChunkTypeWithAddress::new(
                SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 9422),
                ChunkType::Standard,
            )],
        }
    }

    fn with_status(status: Status, lock_id: u32, file_length: u64) -> WriteChunkReply {
        WriteChunkReply {
            status,
            ..granted(lock_id, file_length)
        }
    }

    fn setup() -> (Arc<ScriptedMaster>, WriteChunkLocator) {
        let master = Arc::new(ScriptedMaster::default());
        let locator = WriteChunkLocator::new(master.clone());
        (master, locator)
    }

    #[test]
    fn lock_and_unlock() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 1000));
        master.push_end(STATUS_OK);

        locator.locate_and_lock_chunk(10, 0).unwrap();
        assert!(locator.is_locked());
        assert_eq!(locator.lock_id(), 42);
        let info = locator.location_info();
        assert_eq!(info.chunk_id, 7);
        assert_eq!(info.version, 2);
        assert_eq!(info.file_length, 1000);
        assert_eq!(info.locations.len(), 1);
        assert_eq!(master.requests.lock().unwrap()[0].lock_id, 0);

        locator.set_file_length(5000);
        locator.unlock_chunk().unwrap();
        assert!(!locator.is_locked());
        assert_eq!(master.ends.lock().unwrap()[0], (7, 42, 10, 5000));
        // the handle taken before set_file_length is unchanged
        assert_eq!(info.file_length, 1000);
    }

    #[test]
    fn renewal_sends_lock_and_keeps_length() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 1000));
        master.push_write(granted(42, 300));

        locator.locate_and_lock_chunk(10, 0).unwrap();
        locator.set_file_length(2000);
        locator.locate_and_lock_chunk(10, 0).unwrap();

        let requests = master.requests.lock().unwrap();
        assert_eq!(requests[1].lock_id, 42);
        assert_eq!(requests[1].file_length, 2000);
        assert_eq!(requests[1].chunk_id, 7);
        assert_eq!(locator.location_info().file_length, 2000);
        assert_eq!(locator.lock_id(), 42);
    }

    #[test]
    fn failed_renewal_keeps_length() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 1000));
        master.push_write(with_status(ERROR_CHUNKBUSY, 42, 9999));

        locator.locate_and_lock_chunk(10, 0).unwrap();
        let err = locator.locate_and_lock_chunk(10, 0).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.status(), ERROR_CHUNKBUSY);
        assert_eq!(locator.location_info().file_length, 1000);
        assert_eq!(locator.lock_id(), 42);
    }

    #[test]
    fn first_lock_takes_length_from_master() {
        let (master, mut locator) = setup();
        master.push_write(with_status(ERROR_LOCKED, 0, 777));
        master.push_write(granted(5, 888));

        assert!(locator.locate_and_lock_chunk(10, 0).unwrap_err().is_recoverable());
        assert_eq!(locator.location_info().file_length, 777);
        locator.locate_and_lock_chunk(10, 0).unwrap();
        assert_eq!(locator.location_info().file_length, 888);
    }

    #[test]
    fn transient_statuses_are_recoverable() {
        for status in [
            ERROR_IO,
            ERROR_NOCHUNKSERVERS,
            ERROR_LOCKED,
            ERROR_CHUNKBUSY,
            ERROR_CHUNKLOST,
        ] {
            let (master, mut locator) = setup();
            master.push_write(with_status(status, 13, 0));
            let err = locator.locate_and_lock_chunk(10, 0).unwrap_err();
            assert!(err.is_recoverable(), "status {}", status);
            assert_eq!(err.status(), status);
            assert_eq!(locator.lock_id(), 13);
        }
    }

    #[test]
    fn other_statuses_drop_lock() {
        for status in [ERROR_ENOENT, ERROR_QUOTA, ERROR_NOTLOCKED, 200] {
            let (master, mut locator) = setup();
            master.push_write(granted(42, 0));
            master.push_write(with_status(status, 42, 0));

            locator.locate_and_lock_chunk(10, 0).unwrap();
            let err = locator.locate_and_lock_chunk(10, 0).unwrap_err();
            assert!(!err.is_recoverable(), "status {}", status);
            assert_eq!(err.status(), status);
            assert_eq!(locator.lock_id(), 0);
        }
    }

    #[test]
    fn torn_down_renewal_keeps_length() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 1000));
        master.push_write(with_status(ERROR_QUOTA, 42, 9999));

        locator.locate_and_lock_chunk(10, 0).unwrap();
        locator.set_file_length(2000);
        let err = locator.locate_and_lock_chunk(10, 0).unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(err.status(), ERROR_QUOTA);
        assert_eq!(locator.location_info().file_length, 2000);
        assert_eq!(locator.lock_id(), 0);
    }

    #[test]
    fn relock_after_teardown_is_allowed() {
        let (master, mut locator) = setup();
        master.push_write(with_status(ERROR_ENOENT, 0, 0));
        master.push_write(granted(3, 0));

        assert!(locator.locate_and_lock_chunk(10, 0).is_err());
        locator.locate_and_lock_chunk(11, 4).unwrap();
        assert_eq!((locator.inode(), locator.index()), (11, 4));
    }

    #[test]
    #[should_panic(expected = "is still locked")]
    fn switching_chunks_while_locked_panics() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 0));

        locator.locate_and_lock_chunk(10, 0).unwrap();
        let _ = locator.locate_and_lock_chunk(10, 1);
    }

    #[test]
    #[should_panic(expected = "without a locked chunk")]
    fn unlock_without_lock_panics() {
        let (_master, mut locator) = setup();
        let _ = locator.unlock_chunk();
    }

    #[test]
    fn unlock_io_failure_keeps_lock() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 0));
        master.push_end(ERROR_IO);
        master.push_end(STATUS_OK);

        locator.locate_and_lock_chunk(10, 0).unwrap();
        let err = locator.unlock_chunk().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(locator.lock_id(), 42);
        locator.unlock_chunk().unwrap();
        assert_eq!(locator.lock_id(), 0);
        assert_eq!(master.ends.lock().unwrap().len(), 2);
    }

    #[test]
    fn unlock_rejected_ends_session() {
        let (master, mut locator) = setup();
        master.push_write(granted(42, 0));
        master.push_end(ERROR_NOTLOCKED);
        master.push_write(granted(43, 0));

        locator.locate_and_lock_chunk(10, 0).unwrap();
        let err = locator.unlock_chunk().unwrap_err();
        assert!(!err.is_recoverable());
        assert_eq!(err.status(), ERROR_NOTLOCKED);
        assert_eq!(locator.lock_id(), 0);
        // a new session may target another chunk
        locator.locate_and_lock_chunk(10, 1).unwrap();
        assert_eq!(master.requests.lock().unwrap()[1].lock_id, 0);
    }
}
