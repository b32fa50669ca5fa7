//! CRC-32 over bus frames.
//!
//! TODO: bring up a captured-frame regression suite once real bus traces
//! are available, the way the BM13xx CRC5/CRC16 tests use esp-miner
//! captures as ground truth.

use crc_all::CrcAlgo;

/// Calculates the standard CRC-32 (IEEE 802.3) used by `zlib`/`gzip`.
///
/// Parameters: polynomial 0x04C11DB7 (normal form of the commonly quoted
/// reflected 0xEDB88320), init 0xFFFFFFFF, xorout 0xFFFFFFFF, reflected
/// input and output.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;
    CRC32.update_crc(&mut crc, data);
    CRC32.finish_crc(&crc)
}

const CRC32_INIT: u32 = 0xFFFF_FFFF;

const CRC32: CrcAlgo<u32> = CrcAlgo::<u32>::new(
    0x04C1_1DB7, // polynomial
    32,          // width
    CRC32_INIT,  // init
    0xFFFF_FFFF, // xorout
    true,        // reflected in/out
);
