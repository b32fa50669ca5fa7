//! The bus protocol engine: addressing, opcodes, CRC, and the frame codec.

pub mod address;
pub mod codec;
pub mod command;
pub mod crc;
pub mod frame;

pub use address::{Address, BROADCAST_ID};
pub use codec::{FrameCodec, OutboundFrame};
pub use command::{Command, NodeInfoKind};
pub use crc::crc32;
pub use frame::{ReceiveRecord, RxAddress};
