use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::phase::PhaseId;
use crate::domain::process::ProcessId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(pub String);

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// One approval request for a (process, phase) pair as persisted by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    #[serde(rename = "idApproval")]
    pub id: ApprovalId,
    #[serde(rename = "idProcess")]
    pub process_id: ProcessId,
    #[serde(rename = "idPhase")]
    pub phase_id: PhaseId,
    #[serde(default)]
    pub phase_order: u32,
    #[serde(default)]
    pub phase_title: String,
    pub status: ApprovalStatus,
    pub requested_by: String,
    #[serde(default, with = "timestamp")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default, with = "timestamp")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl ApprovalRecord {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.status, ApprovalStatus::Pending)
    }
}

/// Body of `POST /approvals`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApprovalRequest {
    #[serde(rename = "idProcess")]
    pub process_id: ProcessId,
    #[serde(rename = "idPhase")]
    pub phase_id: PhaseId,
    pub phase_order: u32,
    pub phase_title: String,
    pub requested_by: String,
    pub comments: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approved,
    Rejected,
}

/// Body of `POST /approvals/review`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    #[serde(rename = "idApproval")]
    pub approval_id: ApprovalId,
    pub action: ReviewAction,
    pub reviewed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Backend timestamps arrive either as RFC 3339 or as naive local
/// `YYYY-MM-DDTHH:MM:SS[.fff]`, which is read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&value.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
            return Ok(None);
        };

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }

        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
