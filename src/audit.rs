//! Append-only audit trail
//!
//! Every successful state transition writes exactly one entry, in the same
//! storage transaction as the transition itself. Entries are never updated
//! or deleted; the chronological sequence for a request is its full
//! history.
use super::request::TimeStamp;
use chrono::Utc;
use uuid7::uuid7;

/// Closed set of auditable actions. Filters in the presentation layer
/// match on these labels, so the set only grows, never changes.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum AuditAction {
    #[n(0)]
    RequestSubmitted,
    #[n(1)]
    LevelApproval,
    #[n(2)]
    RequestRejected,
    #[n(3)]
    PaymentProcessing,
    #[n(4)]
    PaymentCompleted,
    #[n(5)]
    VendorAdded,
    #[n(6)]
    VendorUpdated,
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::RequestSubmitted => "Payment Request Submitted",
            AuditAction::LevelApproval => "Level Approval",
            AuditAction::RequestRejected => "Payment Request Rejected",
            AuditAction::PaymentProcessing => "Payment Processing",
            AuditAction::PaymentCompleted => "Payment Completed",
            AuditAction::VendorAdded => "Vendor Added",
            AuditAction::VendorUpdated => "Vendor Updated",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResultStatus {
    #[n(0)]
    Success,
    #[n(1)]
    Failed,
}

impl ResultStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Failed => "failed",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct AuditEntry {
    // uuid7: time-ordered, so the ledger key `aud/{id}` iterates the trail
    // chronologically without a secondary index
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub recorded_at: TimeStamp<Utc>,
    #[n(2)]
    pub action: AuditAction,
    #[n(3)]
    pub actor_id: String,
    #[n(4)]
    pub request_id: Option<String>, // vendor-only entries carry None
    #[n(5)]
    pub details: String,
    #[n(6)]
    pub result_status: ResultStatus,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        actor_id: String,
        request_id: Option<String>,
        details: String,
        result_status: ResultStatus,
    ) -> Self {
        Self {
            id: uuid7().to_string(),
            recorded_at: TimeStamp::new(),
            action,
            actor_id,
            request_id,
            details,
            result_status,
        }
    }
}

/// Read-side filter, mirroring the dashboard's audit trail controls:
/// free text matches case-insensitively over action, actor, request id and
/// details; status and action filters narrow further.
#[derive(Default, Debug, Clone)]
pub struct AuditFilter {
    pub search_term: Option<String>,
    pub result_status: Option<ResultStatus>,
    pub action_contains: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(term) = &self.search_term {
            let term = term.to_lowercase();
            let hit = entry.action.label().to_lowercase().contains(&term)
                || entry.actor_id.to_lowercase().contains(&term)
                || entry
                    .request_id
                    .as_deref()
                    .is_some_and(|id| id.to_lowercase().contains(&term))
                || entry.details.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(status) = self.result_status {
            if entry.result_status != status {
                return false;
            }
        }
        if let Some(action) = &self.action_contains {
            let hit = entry
                .action
                .label()
                .to_lowercase()
                .contains(&action.to_lowercase());
            if !hit {
                return false;
            }
        }
        true
    }
}
