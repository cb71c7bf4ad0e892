//! Flat chunkserver list sent by masters that predate structured replies.
//!
//! The list is a sequence of 6-byte records, a big-endian IPv4 address
//! followed by a big-endian port. Every record names a standard replica.

use crate::chunk::{ChunkLocations, ChunkType, ChunkTypeWithAddress, NetworkAddress};
use bincode::config::{self, Config};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use std::net::{Ipv4Addr, SocketAddrV4};

pub const ENTRY_SIZE: usize = 6;

#[derive(Debug, Encode, Decode)]
struct ChunkserverEntry {
    ip: u32,
    port: u16,
}

fn wire_config() -> impl Config {
    config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

pub fn decode_chunkservers(mut data: &[u8]) -> Result<ChunkLocations, DecodeError> {
    let mut locations = Vec::with_capacity(data.len() / ENTRY_SIZE);
    while !data.is_empty() {
        let (entry, read): (ChunkserverEntry, usize) =
            bincode::decode_from_slice(data, wire_config())?;
        locations.push(ChunkTypeWithAddress::new(
            SocketAddrV4::new(Ipv4Addr::from(entry.ip), entry.port),
            ChunkType::Standard,
        ));
        data = &data[read..];
    }
    Ok(locations)
}

pub fn encode_chunkservers<'a, I>(addresses: I) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = &'a NetworkAddress>,
{
    let mut data = Vec::new();
    for address in addresses {
        let entry = ChunkserverEntry {
            ip: u32::from(*address.ip()),
            port: address.port(),
        };
        data.extend(bincode::encode_to_vec(entry, wire_config())?);
    }
    Ok(data)
}
