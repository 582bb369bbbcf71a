use crate::error::{CareError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Misconduct,
    ServiceQuality,
    Safety,
    PaymentDispute,
    Other,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    UnderInvestigation,
    Resolved,
    Dismissed,
}

/// What the resolving admin decided to do about the report.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    Warning,
    Suspension,
    Termination,
    Refund,
    NoAction,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Resolution {
    pub action: ResolutionAction,
    pub notes: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

/// A participant-filed report of misconduct or dispute tied to a booking.
///
/// Independently persisted and retained regardless of how the booking ends,
/// so the audit trail survives later corrections to booking fields.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Incident {
    pub id: String,
    pub booking_id: String,
    pub reporter_id: String,
    pub against_id: String,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub description: String,
    pub evidence: Vec<String>,
    status: IncidentStatus,
    pub resolution: Option<Resolution>,
    pub reported_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub booking_id: String,
    pub reporter_id: String,
    pub against_id: String,
    pub kind: IncidentKind,
    pub severity: Severity,
    pub description: String,
    pub evidence: Vec<String>,
}

impl Incident {
    pub fn new(id: impl Into<String>, params: NewIncident) -> Self {
        Self {
            id: id.into(),
            booking_id: params.booking_id,
            reporter_id: params.reporter_id,
            against_id: params.against_id,
            kind: params.kind,
            severity: params.severity,
            description: params.description,
            evidence: params.evidence,
            status: IncidentStatus::Reported,
            resolution: None,
            reported_at: Utc::now(),
            version: 0,
        }
    }

    pub fn status(&self) -> IncidentStatus {
        self.status
    }

    pub fn begin_investigation(&mut self) -> Result<()> {
        if self.status != IncidentStatus::Reported {
            return Err(CareError::Validation(format!(
                "incident {} is not awaiting investigation",
                self.id
            )));
        }
        self.status = IncidentStatus::UnderInvestigation;
        Ok(())
    }

    pub fn resolve(&mut self, resolution: Resolution) -> Result<()> {
        self.ensure_open()?;
        self.status = IncidentStatus::Resolved;
        self.resolution = Some(resolution);
        Ok(())
    }

    pub fn dismiss(&mut self, resolution: Resolution) -> Result<()> {
        self.ensure_open()?;
        self.status = IncidentStatus::Dismissed;
        self.resolution = Some(resolution);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.status {
            IncidentStatus::Reported | IncidentStatus::UnderInvestigation => Ok(()),
            _ => Err(CareError::Validation(format!(
                "incident {} is already closed",
                self.id
            ))),
        }
    }
}
