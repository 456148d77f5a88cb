//! Draw outcome extraction from confirmed execution logs.

use crate::error::{FlipError, Result};
use drawkit_core::TransactionReceipt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker emitted by the settle instruction.
pub const RESULT_MARKER: &str = "FLIP_RESULT:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlipResult {
    Winner,
    Loser,
}

impl FromStr for FlipResult {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "WINNER" => Ok(Self::Winner),
            "LOSER" => Ok(Self::Loser),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FlipResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner => write!(f, "WINNER"),
            Self::Loser => write!(f, "LOSER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub participant: String,
    pub result: FlipResult,
}

/// Scan a confirmed receipt for the single marker line and decode it.
///
/// A missing marker means the settle instruction did not run to completion;
/// that is surfaced as `ResultNotFound`, distinct from transport failures,
/// so operators can tell "draw never happened" from "draw happened but
/// could not be read".
pub fn extract(receipt: &TransactionReceipt) -> Result<DrawOutcome> {
    let line = receipt
        .logs
        .iter()
        .find_map(|l| l.find(RESULT_MARKER).map(|start| &l[start..]))
        .ok_or(FlipError::ResultNotFound {
            signature: receipt.signature,
        })?;

    parse_marker_line(line).ok_or_else(|| FlipError::MalformedResult {
        line: line.to_string(),
    })
}

fn parse_marker_line(line: &str) -> Option<DrawOutcome> {
    let payload = line.strip_prefix(RESULT_MARKER)?.trim();
    let (participant, result) = payload.rsplit_once(':')?;
    let participant = participant.trim();
    if participant.is_empty() {
        return None;
    }
    let result = result.trim().parse().ok()?;
    Some(DrawOutcome {
        participant: participant.to_string(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use drawkit_core::{Durability, Signature};

    fn receipt(logs: Vec<&str>) -> TransactionReceipt {
        TransactionReceipt {
            signature: Signature::default(),
            durability: Durability::Confirmed,
            logs: logs.into_iter().map(String::from).collect(),
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_the_marker_line() {
        let receipt = receipt(vec![
            "Program log: Instruction: SettleFlip",
            "Program log: FLIP_RESULT: alice: WINNER",
            "Program consumed 4000 compute units",
        ]);

        let outcome = extract(&receipt).unwrap();
        assert_eq!(outcome.participant, "alice");
        assert_eq!(outcome.result, FlipResult::Winner);
    }

    #[test]
    fn missing_marker_is_result_not_found() {
        let receipt = receipt(vec!["Program log: Instruction: SettleFlip"]);

        assert!(matches!(
            extract(&receipt),
            Err(FlipError::ResultNotFound { .. })
        ));
    }

    #[test]
    fn unparseable_payload_is_malformed() {
        let receipt = receipt(vec!["Program log: FLIP_RESULT: alice: MAYBE"]);

        assert!(matches!(
            extract(&receipt),
            Err(FlipError::MalformedResult { .. })
        ));
    }

    #[test]
    fn loser_round_trips_too() {
        let receipt = receipt(vec!["Program log: FLIP_RESULT: bob: LOSER"]);

        let outcome = extract(&receipt).unwrap();
        assert_eq!(outcome.participant, "bob");
        assert_eq!(outcome.result, FlipResult::Loser);
    }
}
