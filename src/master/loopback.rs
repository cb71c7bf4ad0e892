//! In-process master reachable over TCP on 127.0.0.1.
//!
//! Serves one length-prefixed bincode frame per connection and keeps its
//! files, chunks and chunkservers in memory. Meant for tests and the demo
//! binary.

use crate::chunk::{ChunkLocations, ChunkTypeWithAddress};
use crate::legacy;
use crate::master::{
    LegacyReadChunkReply, MasterClient, ReadChunkReply, WriteChunkReply, WriteChunkRequest,
};
use crate::status::*;
use bincode::error::{DecodeError, EncodeError};
use log::{debug, warn};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::{self, Read, Write},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopbackError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),
    #[error("frame of {0} bytes exceeds the {} byte limit", MAX_FRAME_SIZE)]
    FrameTooLarge(u64),
    #[error("unexpected response from master")]
    UnexpectedResponse,
}

/// Largest frame either side accepts.
pub const MAX_FRAME_SIZE: u64 = 16 << 20;

#[derive(Debug, Serialize, Deserialize)]
enum Request {
    ReadChunk {
        inode: u32,
        index: u32,
    },
    LegacyReadChunk {
        inode: u32,
        index: u32,
    },
    WriteChunk(WriteChunkRequest),
    WriteEnd {
        chunk_id: u64,
        lock_id: u32,
        inode: u32,
        file_length: u64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
enum Response {
    ReadChunk(Result<ReadChunkReply, Status>),
    LegacyReadChunk(Result<LegacyReadChunkReply, Status>),
    WriteChunk(WriteChunkReply),
    WriteEnd(Status),
}

fn send_frame<T: Serialize>(stream: &mut TcpStream, value: &T) -> Result<(), LoopbackError> {
    let buf = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    stream.write_all(&(buf.len() as u64).to_be_bytes())?;
    stream.write_all(&buf)?;
    Ok(())
}

fn recv_frame<T: DeserializeOwned>(stream: &mut TcpStream) -> Result<T, LoopbackError> {
    let mut len = 0u64.to_be_bytes();
    stream.read_exact(&mut len)?;
    let len = u64::from_be_bytes(len);
    if len > MAX_FRAME_SIZE {
        return Err(LoopbackError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf)?;
    let (value, _) = bincode::serde::decode_from_slice(&buf, bincode::config::standard())?;
    Ok(value)
}

#[derive(Debug, Default)]
struct FileEntry {
    length: u64,
    chunks: HashMap<u32, u64>,
}

#[derive(Debug)]
struct ChunkEntry {
    version: u32,
    lock_id: u32,
    replicas: ChunkLocations,
}

#[derive(Debug, Default)]
struct Table {
    files: HashMap<u32, FileEntry>,
    chunks: HashMap<u64, ChunkEntry>,
    chunkservers: ChunkLocations,
    last_chunk_id: u64,
}

impl Table {
    fn read_chunk(&self, inode: u32, index: u32) -> Result<ReadChunkReply, Status> {
        let file = self.files.get(&inode).ok_or(ERROR_ENOENT)?;
        let reply = match file.chunks.get(&index) {
            Some(chunk_id) => {
                let chunk = self.chunks.get(chunk_id).ok_or(ERROR_NOCHUNK)?;
                ReadChunkReply {
                    chunk_id: *chunk_id,
                    version: chunk.version,
                    file_length: file.length,
                    locations: chunk.replicas.clone(),
                }
            }
            None => ReadChunkReply {
                file_length: file.length,
                ..Default::default()
            },
        };
        Ok(reply)
    }

    fn legacy_read_chunk(&self, inode: u32, index: u32) -> Result<LegacyReadChunkReply, Status> {
        let reply = self.read_chunk(inode, index)?;
        let standard = reply
            .locations
            .iter()
            .filter(|l| l.chunk_type.is_standard())
            .map(|l| &l.address);
        let chunkservers = legacy::encode_chunkservers(standard).map_err(|err| {
            warn!("cannot encode chunkserver list: {}", err);
            ERROR_IO
        })?;
        Ok(LegacyReadChunkReply {
            chunk_id: reply.chunk_id,
            version: reply.version,
            file_length: reply.file_length,
            chunkservers,
        })
    }

    fn write_chunk(&mut self, request: &WriteChunkRequest) -> WriteChunkReply {
        let Table {
            files,
            chunks,
            chunkservers,
            last_chunk_id,
        } = self;
        let file = match files.get_mut(&request.inode) {
            Some(file) => file,
            None => return WriteChunkReply::failed(ERROR_ENOENT, request),
        };
        if chunkservers.is_empty() {
            return WriteChunkReply::failed(ERROR_NOCHUNKSERVERS, request);
        }

        let chunk_id = match file.chunks.get(&request.index).copied() {
            Some(chunk_id) => {
                let chunk = match chunks.get_mut(&chunk_id) {
                    Some(chunk) => chunk,
                    None => return WriteChunkReply::failed(ERROR_NOCHUNK, request),
                };
                if chunk.lock_id != 0 && chunk.lock_id != request.lock_id {
                    return WriteChunkReply::failed(ERROR_LOCKED, request);
                }
                if request.lock_id != 0 && chunk.lock_id == 0 {
                    return WriteChunkReply::failed(ERROR_NOTLOCKED, request);
                }
                if request.lock_id == 0 {
                    chunk.version += 1;
                    chunk.lock_id = new_lock_id();
                }
                chunk_id
            }
            None => {
                if request.lock_id != 0 {
                    return WriteChunkReply::failed(ERROR_NOTLOCKED, request);
                }
                *last_chunk_id += 1;
                chunks.insert(
                    *last_chunk_id,
                    ChunkEntry {
                        version: 1,
                        lock_id: new_lock_id(),
                        replicas: chunkservers.clone(),
                    },
                );
                file.chunks.insert(request.index, *last_chunk_id);
                *last_chunk_id
            }
        };

        let chunk = &chunks[&chunk_id];
        WriteChunkReply {
            status: STATUS_OK,
            lock_id: chunk.lock_id,
            chunk_id,
            version: chunk.version,
            file_length: file.length,
            locations: chunk.replicas.clone(),
        }
    }

    fn write_end(&mut self, chunk_id: u64, lock_id: u32, inode: u32, file_length: u64) -> Status {
        let chunk = match self.chunks.get_mut(&chunk_id) {
            Some(chunk) => chunk,
            None => return ERROR_NOCHUNK,
        };
        if chunk.lock_id == 0 || chunk.lock_id != lock_id {
            return ERROR_NOTLOCKED;
        }
        chunk.lock_id = 0;
        if let Some(file) = self.files.get_mut(&inode) {
            file.length = file_length;
        }
        STATUS_OK
    }

    fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::ReadChunk { inode, index } => Response::ReadChunk(self.read_chunk(inode, index)),
            Request::LegacyReadChunk { inode, index } => {
                Response::LegacyReadChunk(self.legacy_read_chunk(inode, index))
            }
            Request::WriteChunk(request) => Response::WriteChunk(self.write_chunk(&request)),
            Request::WriteEnd {
                chunk_id,
                lock_id,
                inode,
                file_length,
            } => Response::WriteEnd(self.write_end(chunk_id, lock_id, inode, file_length)),
        }
    }
}

fn new_lock_id() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

fn serve(stream: &mut TcpStream, table: &Mutex<Table>) -> Result<(), LoopbackError> {
    let request: Request = recv_frame(stream)?;
    debug!("loopback master request {:?}", request);
    let response = table
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .handle(request);
    send_frame(stream, &response)
}

pub struct LoopbackMaster {
    addr: SocketAddrV4,
    table: Arc<Mutex<Table>>,
    _handle: JoinHandle<()>,
}

impl LoopbackMaster {
    /// Binds 127.0.0.1:`port`; port 0 picks a free one.
    pub fn new(port: u16) -> Result<Self, LoopbackError> {
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))?;
        let addr = match listener.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!("bound to an IPv4 address"),
        };
        let table: Arc<Mutex<Table>> = Default::default();
        let handle = {
            let table = table.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let result = stream
                        .map_err(LoopbackError::from)
                        .and_then(|mut stream| serve(&mut stream, &table));
                    if let Err(err) = result {
                        warn!("loopback master: {}", err);
                    }
                }
            })
        };
        Ok(Self {
            addr,
            table,
            _handle: handle,
        })
    }

    pub fn address(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn client(&self) -> LoopbackClient {
        LoopbackClient::new(self.addr)
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an empty file under `inode`.
    pub fn create_file(&self, inode: u32) {
        self.table().files.entry(inode).or_default();
    }

    /// Adds a replica target; chunks created afterwards are placed on every registered one.
    pub fn add_chunkserver(&self, location: ChunkTypeWithAddress) {
        self.table().chunkservers.push(location);
    }

    pub fn file_length(&self, inode: u32) -> Option<u64> {
        self.table().files.get(&inode).map(|f| f.length)
    }

    /// Lock currently held on a chunk, 0 when unlocked.
    pub fn chunk_lock(&self, chunk_id: u64) -> Option<u32> {
        self.table().chunks.get(&chunk_id).map(|c| c.lock_id)
    }
}

/// `MasterClient` speaking to a `LoopbackMaster`, one connection per call.
#[derive(Debug, Clone)]
pub struct LoopbackClient {
    addr: SocketAddrV4,
}

impl LoopbackClient {
    pub fn new(addr: SocketAddrV4) -> Self {
        Self { addr }
    }

    fn call(&self, request: &Request) -> Result<Response, LoopbackError> {
        let mut stream = TcpStream::connect(self.addr)?;
        send_frame(&mut stream, request)?;
        recv_frame(&mut stream)
    }

    fn io_failure(&self, err: LoopbackError) -> Status {
        warn!("master at {} unreachable: {}", self.addr, err);
        ERROR_IO
    }
}

impl MasterClient for LoopbackClient {
    fn read_chunk(&self, inode: u32, index: u32) -> Result<ReadChunkReply, Status> {
        self.call(&Request::ReadChunk { inode, index })
            .and_then(|response| match response {
                Response::ReadChunk(reply) => Ok(reply),
                _ => Err(LoopbackError::UnexpectedResponse),
            })
            .unwrap_or_else(|err| Err(self.io_failure(err)))
    }

    fn legacy_read_chunk(&self, inode: u32, index: u32) -> Result<LegacyReadChunkReply, Status> {
        self.call(&Request::LegacyReadChunk { inode, index })
            .and_then(|response| match response {
                Response::LegacyReadChunk(reply) => Ok(reply),
                _ => Err(LoopbackError::UnexpectedResponse),
            })
            .unwrap_or_else(|err| Err(self.io_failure(err)))
    }

    fn write_chunk(&self, request: &WriteChunkRequest) -> WriteChunkReply {
        self.call(&Request::WriteChunk(request.clone()))
            .and_then(|response| match response {
                Response::WriteChunk(reply) => Ok(reply),
                _ => Err(LoopbackError::UnexpectedResponse),
            })
            .unwrap_or_else(|err| WriteChunkReply::failed(self.io_failure(err), request))
    }

    fn write_end(&self, chunk_id: u64, lock_id: u32, inode: u32, file_length: u64) -> Status {
        let request = Request::WriteEnd {
            chunk_id,
            lock_id,
            inode,
            file_length,
        };
        self.call(&request)
            .and_then(|response| match response {
                Response::WriteEnd(status) => Ok(status),
                _ => Err(LoopbackError::UnexpectedResponse),
            })
            .unwrap_or_else(|err| self.io_failure(err))
    }
}
