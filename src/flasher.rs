//! Firmware broadcast, preamble-safe block encoding, and remote CRC verify.

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::protocol::frame::PREAMBLE_BYTE;
use crate::protocol::{Address, Command, NodeInfoKind};
use crate::tracing_prelude::*;
use crate::transport::Transport;

/// Logical flash base address firmware blocks are written to.
pub const FLASH_BASE: u32 = 0x0800_0000;
pub const BLOCK_SIZE: usize = 64;

const ENTER_BOOTLOADER_DEFAULT: Duration = Duration::from_secs(1);
const ENTER_BOOTLOADER_SETTLE: Duration = Duration::from_millis(200);
const IDENTITY_WRITE_TIMEOUT: Duration = Duration::from_millis(500);
const VERIFY_CRC_TIMEOUT: Duration = Duration::from_secs(1);
const START_APP_SETTLE: Duration = Duration::from_millis(200);

/// Stream the sustained 0x7F preamble for `duration` so nodes abandon the
/// application and latch into bootloader mode, then let the bus settle.
pub async fn enter_bootloader(transport: &mut Transport, duration: Option<Duration>) -> Result<()> {
    let duration = duration.unwrap_or(ENTER_BOOTLOADER_DEFAULT);
    let start = Instant::now();
    while start.elapsed() < duration {
        transport.write_raw(&[PREAMBLE_BYTE]).await?;
    }
    tokio::time::sleep(ENTER_BOOTLOADER_SETTLE).await;
    Ok(())
}

/// Set a node's firmware-id slot. Returns whether any response arrived.
pub async fn set_fw_id(transport: &mut Transport, address: Address, fw_id: u8) -> Result<bool> {
    set_node_info(transport, address, NodeInfoKind::FirmwareId, fw_id).await
}

/// Set a node's operator-assigned node id. Returns whether any response arrived.
pub async fn set_node_id(transport: &mut Transport, address: Address, node_id: u8) -> Result<bool> {
    set_node_info(transport, address, NodeInfoKind::NodeId, node_id).await
}

async fn set_node_info(
    transport: &mut Transport,
    address: Address,
    kind: NodeInfoKind,
    value: u8,
) -> Result<bool> {
    transport
        .send(address, Command::SetNodeInfo.into(), &[kind as u8, value])
        .await?;
    Ok(transport.get_response(IDENTITY_WRITE_TIMEOUT).await.is_some())
}

/// Broadcast `image`, right-padded to a 64-byte boundary, as a sequence of
/// preamble-safe `BOOT_WRITE` blocks targeting firmware-id slot `fw_id`.
pub async fn update_firmware(transport: &mut Transport, image: &[u8], fw_id: u8) -> Result<()> {
    let padded = pad_to_block_boundary(image);
    let total_blocks = padded.len() / BLOCK_SIZE;

    transport
        .send(Address::broadcast(), Command::Silence.into(), &[])
        .await?;

    for (i, chunk) in padded.chunks(BLOCK_SIZE).enumerate() {
        let address = FLASH_BASE + (BLOCK_SIZE * i) as u32;
        let mut raw = Vec::with_capacity(4 + BLOCK_SIZE);
        raw.extend_from_slice(&address.to_le_bytes());
        raw.extend_from_slice(chunk);

        let corr = find_preamble_safe_correction(&raw);
        let mut write_payload = Vec::with_capacity(2 + raw.len());
        write_payload.push(fw_id);
        write_payload.push(corr);
        write_payload.extend(raw.iter().map(|b| b.wrapping_sub(corr)));

        transport
            .send(Address::broadcast(), Command::Write.into(), &write_payload)
            .await?;

        info!("writing block {}/{total_blocks}", i + 1);
    }

    transport
        .send(Address::broadcast(), Command::Unsilence.into(), &[])
        .await?;
    Ok(())
}

/// Right-pad `image` with `0xFF` to the next 64-byte boundary.
fn pad_to_block_boundary(image: &[u8]) -> Vec<u8> {
    let mut padded = image.to_vec();
    let remainder = padded.len() % BLOCK_SIZE;
    if remainder != 0 {
        padded.resize(padded.len() + (BLOCK_SIZE - remainder), 0xFF);
    }
    padded
}

/// Smallest `corr` in `[0, 255]` such that subtracting it (mod 256) from
/// every byte of `raw` never yields the preamble byte. Always exists: a
/// 68-byte block forbids at most 68 of the 256 possible offsets.
fn find_preamble_safe_correction(raw: &[u8]) -> u8 {
    (0u16..=255)
        .map(|c| c as u8)
        .find(|&corr| raw.iter().all(|&b| b.wrapping_sub(corr) != PREAMBLE_BYTE))
        .expect("some offset in [0, 255] always avoids the preamble byte for a 68-byte block")
}

/// Request the remote CRC-32 of `length` bytes starting at `FLASH_BASE`.
pub async fn get_verify_crc(transport: &mut Transport, address: Address, length: u32) -> Result<Option<u32>> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&FLASH_BASE.to_le_bytes());
    payload.extend_from_slice(&length.to_le_bytes());

    transport.send(address, Command::GetCrc.into(), &payload).await?;

    let resp = transport.get_response(VERIFY_CRC_TIMEOUT).await;
    Ok(resp.and_then(|r| {
        (r.cmd == u8::from(Command::GetCrc) && r.payload.len() == 4)
            .then(|| u32::from_le_bytes(r.payload[..4].try_into().unwrap()))
    }))
}

/// Broadcast `BOOT_GO`, jumping all listening nodes to the application.
pub async fn start_app(transport: &mut Transport) -> Result<()> {
    tokio::time::sleep(START_APP_SETTLE).await;
    transport.send(Address::broadcast(), Command::Go.into(), &[]).await
}
