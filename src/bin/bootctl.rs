//! Command-line entry point for multidrop-bootctl.
//!
//! This binary is a thin wrapper around the `bootctl` library: argument
//! parsing, firmware-file loading, and progress/result presentation. None
//! of the bus protocol engine lives here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use bootctl::discovery;
use bootctl::flasher;
use bootctl::protocol::{crc32, Address};
use bootctl::transport::Transport;

#[derive(Parser, Debug)]
#[command(author, version, about = "CH32V003-style multi-drop bootloader host controller")]
struct Args {
    /// Serial port device (e.g. /dev/ttyUSB0 or COM13)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// Target a specific node UID instead of every discovered node
    #[arg(long)]
    uid: Option<String>,

    /// Firmware image path
    #[arg(short = 'i', long = "file")]
    file: Option<PathBuf>,

    /// Firmware-id slot
    #[arg(long, default_value_t = 0)]
    fw: u8,

    /// Scan for nodes. Optional slot count (default 63)
    #[arg(long, num_args = 0..=1, default_missing_value = "63")]
    search: Option<u32>,

    /// Verify remote CRC against the firmware file. Optional slot count (default 63)
    #[arg(long, num_args = 0..=1, default_missing_value = "63")]
    verify: Option<u32>,

    /// Broadcast the firmware file
    #[arg(long)]
    write: bool,

    /// Start the application on all listening nodes
    #[arg(long)]
    run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut transport = Transport::open(&args.port, args.baud)
        .await
        .with_context(|| format!("failed to open {}", args.port))?;

    flasher::enter_bootloader(&mut transport, None).await?;

    if args.write {
        let path = args.file.as_ref().context("-i/--file is required for --write")?;
        let data = std::fs::read(path).with_context(|| format!("reading {path:?}"))?;
        flasher::update_firmware(&mut transport, &data, args.fw).await?;
    }

    if let Some(slots) = args.verify {
        let path = args.file.as_ref().context("-i/--file is required for --verify")?;
        let data = std::fs::read(path).with_context(|| format!("reading {path:?}"))?;
        let expected = crc32(&data);

        let targets: Vec<String> = if let Some(uid) = &args.uid {
            vec![uid.clone()]
        } else {
            let report = discovery::search_nodes(&mut transport, slots, 3).await?;
            report
                .nodes
                .into_iter()
                .filter(|(_, info)| info.fw_id == args.fw)
                .map(|(uid, _)| uid)
                .collect()
        };

        for uid in targets {
            let addr = Address::from_uid_hex(&uid)?;
            let result = flasher::get_verify_crc(&mut transport, addr, data.len() as u32).await?;
            match result {
                Some(crc) if crc == expected => {
                    println!("Node {uid} | Expected: 0x{expected:08X} | Node: 0x{crc:08X} | MATCH")
                }
                Some(crc) => {
                    println!("Node {uid} | Expected: 0x{expected:08X} | Node: 0x{crc:08X} | FAIL")
                }
                None => println!("Node {uid} | Expected: 0x{expected:08X} | Node: TIMEOUT | FAIL"),
            }
        }
    }

    if let Some(slots) = args.search {
        if args.verify.is_none() {
            let report = discovery::search_nodes(&mut transport, slots, 3).await?;
            for (uid, info) in &report.nodes {
                println!("UID: {uid} | Node-ID: {} | FW-ID: {}", info.node_id, info.fw_id);
            }
            for uid in &report.errors {
                println!("UID: {uid} | Node-ID: Error | FW-ID: Error");
            }
        }
    }

    if args.run {
        flasher::start_app(&mut transport).await?;
    }

    transport.close().await;
    Ok(())
}
