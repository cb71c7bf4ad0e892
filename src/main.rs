use chunk_locator as locator;
use locator::master::loopback::LoopbackMaster;
use locator::{ChunkType, ChunkTypeWithAddress, LocatorConfig, ReadChunkLocator, WriteChunkLocator};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opt {
    /// Port for the loopback master, 0 picks a free one
    #[structopt(long, default_value = "0")]
    port: u16,

    /// Resolve reads with the flat chunkserver list
    #[structopt(long)]
    legacy: bool,

    /// Log every master round-trip
    #[structopt(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();
    SimpleLogger::new()
        .with_level(if opt.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init()?;

    let master = LoopbackMaster::new(opt.port)?;
    log::info!("loopback master listening on {}", master.address());
    master.create_file(10);
    master.add_chunkserver(ChunkTypeWithAddress::new(
        SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 9422),
        ChunkType::Standard,
    ));
    master.add_chunkserver(ChunkTypeWithAddress::new(
        SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 2), 9422),
        ChunkType::Xor { level: 2, part: 1 },
    ));
    let client = Arc::new(master.client());

    let mut writer = WriteChunkLocator::new(client.clone());
    writer.locate_and_lock_chunk(10, 0)?;
    log::info!(
        "locked chunk {} with lock id {}",
        writer.location_info().chunk_id,
        writer.lock_id()
    );
    writer.set_file_length(65536);
    writer.unlock_chunk()?;

    let config = if opt.legacy {
        LocatorConfig::legacy()
    } else {
        LocatorConfig::default()
    };
    let reader = ReadChunkLocator::new(client, &config);
    let info = reader.locate_chunk(10, 0)?;
    println!(
        "chunk {} version {} file length {}",
        info.chunk_id, info.version, info.file_length
    );
    for location in &info.locations {
        println!("  {} ({})", location.address, location.chunk_type);
    }
    Ok(())
}
