//! Bootloader command opcodes (spec §4.5, normative table).

/// A bootloader bus command opcode.
///
/// `Erase` is declared for wire compatibility but no flow in this crate
/// emits it (spec Open Question 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetInfo = 0x01,
    GetChipId = 0x02,
    GetId = 0x11,
    Silence = 0x12,
    Unsilence = 0x13,
    Go = 0x21,
    Write = 0x31,
    Erase = 0x44,
    GetCrc = 0xA1,
    GetNodeInfo = 0xC1,
    SetNodeInfo = 0xC2,
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Command::GetInfo,
            0x02 => Command::GetChipId,
            0x11 => Command::GetId,
            0x12 => Command::Silence,
            0x13 => Command::Unsilence,
            0x21 => Command::Go,
            0x31 => Command::Write,
            0x44 => Command::Erase,
            0xA1 => Command::GetCrc,
            0xC1 => Command::GetNodeInfo,
            0xC2 => Command::SetNodeInfo,
            other => return Err(other),
        })
    }
}

/// `BOOT_SET_NODE_INFO` payload kind tags (spec §4.5, identity writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeInfoKind {
    FirmwareId = 0x00,
    NodeId = 0x01,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrips() {
        for cmd in [
            Command::GetInfo,
            Command::GetChipId,
            Command::GetId,
            Command::Silence,
            Command::Unsilence,
            Command::Go,
            Command::Write,
            Command::Erase,
            Command::GetCrc,
            Command::GetNodeInfo,
            Command::SetNodeInfo,
        ] {
            let byte: u8 = cmd.into();
            assert_eq!(Command::try_from(byte).unwrap(), cmd);
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(Command::try_from(0x99), Err(0x99));
    }
}
