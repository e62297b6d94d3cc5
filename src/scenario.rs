//! Scripted treasury scenarios
//!
//! A scenario is a YAML script of steps replayed against a fresh engine, an
//! in-memory value ledger and a manual clock. Failing steps are recorded and
//! the run continues, so a script can show refusals as well as successes.
//!
//! ```yaml
//! start_time: 1700000000
//! funds:
//!   alice: 1000
//! steps:
//!   - op: approve
//!     participant: alice
//!     amount: 300
//!   - op: deposit
//!     participant: alice
//!     amount: 300
//!   - op: advance
//!     days: 8
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use treasury_common::{days, Amount, Clock, ManualClock, ParticipantId, ProposalId, Timestamp};
use treasury_config::TreasuryConfig;
use treasury_governance::VoteChoice;
use treasury_ledger::InMemoryValueLedger;

use crate::engine::TreasuryEngine;
use crate::snapshot::TreasurySnapshot;

/// Start time used when a scenario does not set one
pub const DEFAULT_START_TIME: Timestamp = 1_700_000_000;

/// A replayable script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Initial clock reading
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    /// Value each participant holds on the value ledger before the run
    #[serde(default)]
    pub funds: BTreeMap<String, Amount>,
    /// Steps in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Let the custody account pull up to `amount` from `participant`
    Approve { participant: String, amount: Amount },
    Deposit { participant: String, amount: Amount },
    Withdraw { participant: String, amount: Amount },
    Propose { author: String, title: String },
    Vote { participant: String, proposal: u64, choice: VoteChoice },
    /// Move the clock forward
    Advance {
        #[serde(default)]
        days: u64,
        #[serde(default)]
        secs: u64,
    },
    Finalize { proposal: u64 },
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Approve { participant, amount } => format!("{} approves {}", participant, amount),
            Step::Deposit { participant, amount } => format!("{} deposits {}", participant, amount),
            Step::Withdraw { participant, amount } => format!("{} withdraws {}", participant, amount),
            Step::Propose { author, title } => format!("{} proposes '{}'", author, title),
            Step::Vote { participant, proposal, choice } => {
                format!("{} votes {} on #{}", participant, choice, proposal)
            }
            Step::Advance { days, secs } => format!("advance {}d {}s", days, secs),
            Step::Finalize { proposal } => format!("finalize #{}", proposal),
        }
    }
}

/// What one step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Position in the script
    pub index: usize,
    /// Human readable step
    pub description: String,
    /// Success message or error text
    pub result: Result<String, String>,
}

/// Result of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub outcomes: Vec<StepOutcome>,
    pub snapshot: TreasurySnapshot,
    pub custody_balance: Amount,
}

impl ScenarioReport {
    /// Number of steps that failed
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

impl Scenario {
    /// Parse a scenario from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Read a scenario file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read scenario {}: {}", path.display(), e))?;
        Ok(Self::from_yaml(&contents)?)
    }

    /// Replay the scenario against a fresh treasury
    pub fn run(&self, config: &TreasuryConfig) -> anyhow::Result<ScenarioReport> {
        let token = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
        let clock = ManualClock::new(self.start_time.unwrap_or(DEFAULT_START_TIME));
        let mut engine = TreasuryEngine::new(config, token.clone(), Arc::new(clock.clone()));

        for (name, amount) in &self.funds {
            token.mint(&ParticipantId::from(name.as_str()), *amount)?;
        }

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let result = apply(step, &mut engine, &token, &clock);
            debug!("Step {}: {} -> {:?}", index, step.describe(), result);
            outcomes.push(StepOutcome {
                index,
                description: step.describe(),
                result,
            });
        }

        engine.verify_invariants()?;
        let report = ScenarioReport {
            outcomes,
            snapshot: engine.snapshot(),
            custody_balance: engine.custody_balance(),
        };
        info!("Scenario finished: {} steps, {} failed", report.outcomes.len(), report.failures());
        Ok(report)
    }
}

fn apply(
    step: &Step,
    engine: &mut TreasuryEngine,
    token: &InMemoryValueLedger,
    clock: &ManualClock,
) -> Result<String, String> {
    match step {
        Step::Approve { participant, amount } => {
            token.approve(&ParticipantId::from(participant.as_str()), *amount);
            Ok(format!("allowance {}", amount))
        }
        Step::Deposit { participant, amount } => engine
            .deposit(&ParticipantId::from(participant.as_str()), *amount)
            .map(|balance| format!("balance {}", balance))
            .map_err(|e| e.to_string()),
        Step::Withdraw { participant, amount } => engine
            .withdraw(&ParticipantId::from(participant.as_str()), *amount)
            .map(|balance| format!("balance {}", balance))
            .map_err(|e| e.to_string()),
        Step::Propose { author, title } => engine
            .create_proposal(&ParticipantId::from(author.as_str()), title.as_str())
            .map(|id| format!("proposal {}", id))
            .map_err(|e| e.to_string()),
        Step::Vote { participant, proposal, choice } => engine
            .vote(ProposalId(*proposal), &ParticipantId::from(participant.as_str()), *choice)
            .map(|receipt| format!("weight {}, proposal {}", receipt.weight, receipt.status))
            .map_err(|e| e.to_string()),
        Step::Advance { days: d, secs } => {
            clock.advance(days(*d));
            clock.advance(std::time::Duration::from_secs(*secs));
            Ok(format!("now {}", clock.now()))
        }
        Step::Finalize { proposal } => engine
            .finalize(ProposalId(*proposal))
            .map(|status| format!("proposal {}", status))
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
funds:
  alice: 1000
  bob: 1000
steps:
  - op: approve
    participant: bob
    amount: 200
  - op: deposit
    participant: bob
    amount: 200
  - op: propose
    author: bob
    title: Add AAVE
  - op: vote
    participant: bob
    proposal: 0
    choice: yes
  - op: vote
    participant: bob
    proposal: 0
    choice: yes
  - op: deposit
    participant: alice
    amount: 50
"#;

    #[test_log::test]
    fn test_run_records_successes_and_refusals() {
        let scenario = Scenario::from_yaml(SCRIPT).unwrap();
        let report = scenario.run(&TreasuryConfig::default()).unwrap();

        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.outcomes[3].result, Ok("weight 200, proposal approved".to_string()));
        assert_eq!(report.outcomes[4].result, Err("proposal is closed: #0".to_string()));
        assert!(report.outcomes[5].result.is_err());
        assert_eq!(report.failures(), 2);
        assert_eq!(report.custody_balance, 200);
        assert_eq!(report.snapshot.total_shares, 200);
    }

    #[test]
    fn test_advance_accepts_days_and_secs() {
        let scenario = Scenario::from_yaml(
            "start_time: 100\nsteps:\n  - op: advance\n    days: 1\n    secs: 5\n",
        )
        .unwrap();
        let report = scenario.run(&TreasuryConfig::default()).unwrap();
        assert_eq!(report.outcomes[0].result, Ok("now 86505".to_string()));
    }

    #[test]
    fn test_huge_advance_stops_at_end_of_time() {
        let scenario = Scenario::from_yaml(
            "start_time: 100\nsteps:\n  - op: advance\n    days: 300000000000000\n  - op: advance\n    secs: 18446744073709551615\n",
        )
        .unwrap();
        let report = scenario.run(&TreasuryConfig::default()).unwrap();
        let end = format!("now {}", u64::MAX);
        assert_eq!(report.outcomes[0].result, Ok(end.clone()));
        assert_eq!(report.outcomes[1].result, Ok(end));
    }

    #[test]
    fn test_time_never_wraps_back_into_a_voting_period() {
        let scenario = Scenario::from_yaml(
            r#"
start_time: 100
funds:
  bob: 500
steps:
  - op: approve
    participant: bob
    amount: 500
  - op: deposit
    participant: bob
    amount: 500
  - op: propose
    author: bob
    title: Add AAVE
  - op: advance
    days: 8
  - op: advance
    secs: 18446744073709551615
  - op: vote
    participant: bob
    proposal: 0
    choice: yes
"#,
        )
        .unwrap();
        let report = scenario.run(&TreasuryConfig::default()).unwrap();
        assert_eq!(
            report.outcomes[5].result,
            Err("voting period has ended for proposal #0".to_string())
        );
    }
}
