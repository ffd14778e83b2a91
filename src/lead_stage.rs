//! Lead onboarding pipeline.
//!
//! `LEAD -> CONTACTED -> (DOCUMENTED | ONBOARDING) -> AWAITING_PAYMENT`, after
//! which the lead is converted to a client. Stages are picked by hand in the
//! dashboard; nothing here rejects a move, backward moves are only flagged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStage {
    Lead,
    Contacted,
    Documented,
    Onboarding,
    AwaitingPayment,
}

impl LeadStage {
    pub const ALL: [LeadStage; 5] = [
        LeadStage::Lead,
        LeadStage::Contacted,
        LeadStage::Documented,
        LeadStage::Onboarding,
        LeadStage::AwaitingPayment,
    ];

    /// Position in the pipeline. The two middle branches share a position.
    pub fn pipeline_position(&self) -> u8 {
        match self {
            LeadStage::Lead => 0,
            LeadStage::Contacted => 1,
            LeadStage::Documented | LeadStage::Onboarding => 2,
            LeadStage::AwaitingPayment => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStage::Lead => "LEAD",
            LeadStage::Contacted => "CONTACTED",
            LeadStage::Documented => "DOCUMENTED",
            LeadStage::Onboarding => "ONBOARDING",
            LeadStage::AwaitingPayment => "AWAITING_PAYMENT",
        }
    }
}

impl fmt::Display for LeadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStage {
    type Err = String;

    /// Accepts the wire names and their display forms ("Awaiting payment").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace([' ', '-'], "_");
        LeadStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == key)
            .ok_or_else(|| format!("Unknown lead stage '{}'", s.trim()))
    }
}

/// Tabs of the lead drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTab {
    Details,
    Onboarding,
}

/// Outcome of selecting a new stage for a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageChange {
    pub from: Option<LeadStage>,
    pub to: LeadStage,
    /// Tab to switch to; `None` leaves the drawer where it is.
    pub active_tab: Option<LeadTab>,
}

impl StageChange {
    pub fn is_backward(&self) -> bool {
        self.from
            .is_some_and(|from| self.to.pipeline_position() < from.pipeline_position())
    }
}

/// Applies a manually selected stage. Every transition is accepted.
pub fn apply_stage_change(from: Option<LeadStage>, to: LeadStage) -> StageChange {
    let change = StageChange {
        from,
        to,
        active_tab: (to == LeadStage::Onboarding).then_some(LeadTab::Onboarding),
    };

    if change.is_backward() {
        tracing::warn!(
            "Lead moved backward in pipeline: {} -> {}",
            from.map(|s| s.as_str()).unwrap_or("?"),
            to
        );
    }

    change
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onboarding_switches_tab() {
        let change = apply_stage_change(Some(LeadStage::Contacted), LeadStage::Onboarding);
        assert_eq!(change.active_tab, Some(LeadTab::Onboarding));

        let change = apply_stage_change(Some(LeadStage::Contacted), LeadStage::Documented);
        assert_eq!(change.active_tab, None);
    }

    #[test]
    fn backward_moves_are_allowed_but_flagged() {
        let change = apply_stage_change(Some(LeadStage::AwaitingPayment), LeadStage::Lead);
        assert_eq!(change.to, LeadStage::Lead);
        assert!(change.is_backward());

        // sibling branches are not a step back
        let sideways = apply_stage_change(Some(LeadStage::Onboarding), LeadStage::Documented);
        assert!(!sideways.is_backward());

        assert!(!apply_stage_change(None, LeadStage::Lead).is_backward());
    }

    #[test]
    fn wire_names_are_screaming_snake_case() {
        for stage in LeadStage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, serde_json::json!(stage.as_str()));
        }
        let parsed: LeadStage = serde_json::from_str("\"AWAITING_PAYMENT\"").unwrap();
        assert_eq!(parsed, LeadStage::AwaitingPayment);
    }

    #[test]
    fn parses_display_forms() {
        assert_eq!("Contacted".parse::<LeadStage>(), Ok(LeadStage::Contacted));
        assert_eq!(
            " awaiting payment ".parse::<LeadStage>(),
            Ok(LeadStage::AwaitingPayment)
        );
        assert_eq!("awaiting-payment".parse::<LeadStage>(), Ok(LeadStage::AwaitingPayment));
        assert!("Qualified".parse::<LeadStage>().is_err());
    }
}
