//! Serializable treasury state

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use treasury_common::{Amount, ParticipantId, Timestamp};
use treasury_governance::{GovernanceParams, Proposal};

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Point-in-time copy of the share books and every proposal.
///
/// The journal is not part of a snapshot; a restored engine starts with an
/// empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasurySnapshot {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub taken_at: Timestamp,
    /// Governance rules the proposals run under
    pub params: GovernanceParams,
    /// Share balance per participant
    pub balances: BTreeMap<ParticipantId, Amount>,
    /// Outstanding share supply
    pub total_shares: Amount,
    /// Proposals in id order
    pub proposals: Vec<Proposal>,
}

impl TreasurySnapshot {
    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Number of participants with a non-zero balance
    pub fn holders(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }
}
