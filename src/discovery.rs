//! Slot-based collision-avoidance discovery (spec §4.4).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::{Address, Command};
use crate::tracing_prelude::*;
use crate::transport::Transport;

/// `{node_id, fw_id}` as reported by `BOOT_GET_NODE_INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: u8,
    pub fw_id: u8,
}

/// Discovered UID -> identity map, plus UIDs whose info query timed out.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub nodes: HashMap<String, NodeInfo>,
    pub errors: HashSet<String>,
}

const SLOT_BUDGET_FLOOR: u32 = 32;
const POLL_TIMEOUT: Duration = Duration::from_millis(20);
const UNSILENCE_SETTLE: Duration = Duration::from_millis(50);
const NODE_INFO_TIMEOUT: Duration = Duration::from_millis(500);

/// Enumerate live nodes via the collision-avoidance protocol, then query
/// each discovered UID's node id / firmware id.
pub async fn search_nodes(
    transport: &mut Transport,
    slots: u32,
    retries: u32,
) -> Result<DiscoveryReport> {
    transport
        .send(Address::broadcast(), Command::Unsilence.into(), &[])
        .await?;

    let mut found: Vec<String> = Vec::new();
    let slot_hint = slots.saturating_sub(SLOT_BUDGET_FLOOR).min(u8::MAX as u32) as u8;
    let window = Duration::from_millis(u64::from(slots) * 50 + 200);

    for _ in 0..retries {
        transport
            .send(Address::broadcast(), Command::GetId.into(), &[slot_hint])
            .await?;

        let deadline = tokio::time::Instant::now() + window;
        while tokio::time::Instant::now() < deadline {
            let Some(resp) = transport.get_response(POLL_TIMEOUT).await else {
                continue;
            };
            if resp.cmd != u8::from(Command::GetId) {
                continue;
            }
            let uid_hex = hex::encode_upper(&resp.payload);
            if found.contains(&uid_hex) {
                continue;
            }
            debug!("discovered node {uid_hex}");
            found.push(uid_hex.clone());

            let addr = Address::from_uid_hex(&uid_hex)?;
            transport.send(addr, Command::Silence.into(), &[]).await?;
        }
    }

    transport
        .send(Address::broadcast(), Command::Unsilence.into(), &[])
        .await?;
    tokio::time::sleep(UNSILENCE_SETTLE).await;

    let mut report = DiscoveryReport::default();
    for uid_hex in found {
        let addr = Address::from_uid_hex(&uid_hex)?;
        transport
            .send(addr, Command::GetNodeInfo.into(), &[])
            .await?;
        match transport.get_response(NODE_INFO_TIMEOUT).await {
            Some(resp) if resp.cmd == u8::from(Command::GetNodeInfo) && resp.payload.len() >= 2 => {
                report.nodes.insert(
                    uid_hex,
                    NodeInfo {
                        node_id: resp.payload[0],
                        fw_id: resp.payload[1],
                    },
                );
            }
            _ => {
                warn!("node {uid_hex} did not answer BOOT_GET_NODE_INFO");
                report.errors.insert(uid_hex);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_budget_hint_floors_at_zero() {
        assert_eq!(10u32.saturating_sub(SLOT_BUDGET_FLOOR), 0);
        assert_eq!(63u32.saturating_sub(SLOT_BUDGET_FLOOR), 31);
    }
}
