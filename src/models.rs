use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::lead_stage::{LeadStage, LeadTab};
use crate::subscription_timeline::normalize_date;

// ============ Backend Records ============

/// A client's paid-plan coverage interval, as returned by the backend.
///
/// Dates stay in their raw wire form so the record can be echoed back with
/// the same shape; `start()` and `end()` give the normalized calendar dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Backend identifier (numeric or string depending on the deployment).
    #[serde(default)]
    pub id: Option<Value>,
    /// Owning client reference.
    #[serde(default)]
    pub client: Option<Value>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
    /// Amount paid; the backend sends decimals as strings or numbers.
    #[serde(default)]
    pub amount_paid: Option<Value>,
    /// Inclusive start of coverage (`YYYY-MM-DD`).
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive end of coverage (`YYYY-MM-DD`).
    #[serde(default)]
    pub end_date: Option<String>,
    /// Any other backend fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubscriptionRecord {
    /// Record with only a date range set.
    pub fn with_range(start_date: Option<&str>, end_date: Option<&str>) -> Self {
        Self {
            id: None,
            client: None,
            plan_name: None,
            plan_type: None,
            amount_paid: None,
            start_date: start_date.map(str::to_string),
            end_date: end_date.map(str::to_string),
            extra: Map::new(),
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(normalize_date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(normalize_date)
    }
}

/// Page wrapper some backend list endpoints use.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionList {
    Page { results: Vec<SubscriptionRecord> },
    Bare(Vec<SubscriptionRecord>),
}

impl SubscriptionList {
    pub fn into_records(self) -> Vec<SubscriptionRecord> {
        match self {
            SubscriptionList::Page { results } => results,
            SubscriptionList::Bare(records) => records,
        }
    }
}

/// Payload sent to the backend to create a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSubscription {
    pub client: String,
    pub plan_name: Option<String>,
    pub plan_type: Option<String>,
    pub amount_paid: Option<Value>,
    pub start_date: String,
    pub end_date: String,
}

// ============ Renewal Cadence ============

/// Recurrence period governing how a renewal end date is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenewalCadence {
    #[serde(alias = "weekly", alias = "WEEKLY")]
    Weekly,
    #[serde(alias = "monthly", alias = "MONTHLY")]
    Monthly,
    #[serde(alias = "quarterly", alias = "QUARTERLY")]
    Quarterly,
    #[serde(alias = "yearly", alias = "YEARLY")]
    Yearly,
}

impl RenewalCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalCadence::Weekly => "Weekly",
            RenewalCadence::Monthly => "Monthly",
            RenewalCadence::Quarterly => "Quarterly",
            RenewalCadence::Yearly => "Yearly",
        }
    }
}

impl fmt::Display for RenewalCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenewalCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(RenewalCadence::Weekly),
            "monthly" => Ok(RenewalCadence::Monthly),
            "quarterly" => Ok(RenewalCadence::Quarterly),
            "yearly" => Ok(RenewalCadence::Yearly),
            other => Err(format!("unknown renewal cadence '{}'", other)),
        }
    }
}

// ============ API Request/Response Models ============

/// Request body for renewing a client's plan.
#[derive(Debug, Deserialize)]
pub struct RenewalRequest {
    pub plan_name: Option<String>,
    pub plan_type: Option<String>,
    pub amount_paid: Option<Value>,
    pub cadence: RenewalCadence,
    /// Explicit coverage start; derived from the client's timeline when absent.
    pub start_date: Option<NaiveDate>,
}

/// Query parameters for the calendar renewal-date preview.
#[derive(Debug, Deserialize)]
pub struct NextRenewalQuery {
    pub cadence: RenewalCadence,
    pub anchor: Option<NaiveDate>,
}

/// Query parameters for the fixed-day scheduling preview.
#[derive(Debug, Deserialize)]
pub struct ScheduledDateQuery {
    pub interval: String,
    pub start: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenewalDateResponse {
    pub renewal_date: String,
}

/// Request body for moving a lead through the onboarding pipeline.
#[derive(Debug, Deserialize)]
pub struct StageUpdateRequest {
    pub stage: LeadStage,
    /// Stage the dashboard showed before the change, if known.
    pub previous_stage: Option<LeadStage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageUpdateResponse {
    pub lead_id: String,
    pub stage: LeadStage,
    pub previous_stage: Option<LeadStage>,
    /// Tab the dashboard should switch to, `None` to keep the current one.
    pub active_tab: Option<LeadTab>,
    pub backward: bool,
}

/// Query parameters for lead bulk import.
#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    /// Forward accepted rows even when some rows were rejected.
    #[serde(default)]
    pub partial: bool,
}

/// One row of an uploaded lead sheet.
///
/// Cells are kept as raw JSON because spreadsheet exports send phones as
/// numbers and stages in display case; `lead_import` turns them into row
/// errors instead of failing the whole upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadImportRow {
    pub name: Option<Value>,
    pub email: Option<Value>,
    pub phone: Option<Value>,
    pub stage: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct LeadImportRequest {
    pub rows: Vec<LeadImportRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadImportResponse {
    pub accepted: usize,
    pub rejected: Vec<crate::lead_import::RowError>,
    /// Whether accepted rows were sent to the backend.
    pub forwarded: bool,
    /// Backend response body when rows were forwarded.
    pub backend: Option<Value>,
}
