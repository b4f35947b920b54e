//! Read-side views over the ledger
//!
//! Status totals come from the aggregate buckets the ledger maintains on
//! every transition, so reading them never scans the request set. Listing
//! views scan and filter; they are display queries, not hot paths.
use super::audit::{AuditEntry, AuditFilter};
use super::chain::Role;
use super::error::WorkflowError;
use super::ledger::{LedgerStore, StatusTotals};
use super::request::{ApprovalDecision, PaymentRequest, RequestStatus};
use super::vendor::Vendor;

/// Filter for the request listing, mirroring the dashboard's controls
#[derive(Default, Debug, Clone)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub vendor_id: Option<String>,
}

#[derive(Clone)]
pub struct QueryService {
    ledger: LedgerStore,
}

impl QueryService {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Sum and count of requests currently in the given status
    pub fn status_totals(&self, status: RequestStatus) -> Result<StatusTotals, WorkflowError> {
        self.ledger.status_totals(status)
    }

    /// Totals for every status, in the enum's declaration order
    pub fn totals_by_status(&self) -> Result<Vec<(RequestStatus, StatusTotals)>, WorkflowError> {
        RequestStatus::ALL
            .iter()
            .map(|&status| Ok((status, self.ledger.status_totals(status)?)))
            .collect()
    }

    /// Requests matching the filter, newest first
    pub fn requests(&self, filter: &RequestFilter) -> Result<Vec<PaymentRequest>, WorkflowError> {
        let mut requests: Vec<PaymentRequest> = self
            .ledger
            .requests()?
            .into_iter()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| {
                filter
                    .vendor_id
                    .as_deref()
                    .is_none_or(|v| r.vendor_id == v)
            })
            .collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    /// The pending-by-approver view: requests waiting on the given role
    /// at their current level, newest first
    pub fn pending_for_role(&self, role: Role) -> Result<Vec<PaymentRequest>, WorkflowError> {
        let mut requests: Vec<PaymentRequest> = self
            .ledger
            .requests()?
            .into_iter()
            .filter(|r| r.expected_role() == Some(role))
            .collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    /// Audit entries matching the filter, in chronological order
    pub fn audit_entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self
            .ledger
            .audit_entries()?
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect())
    }

    /// Entries referencing one request, chronological — the request's
    /// reconstructable history
    pub fn audit_entries_for(&self, request_id: &str) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self
            .ledger
            .audit_entries()?
            .into_iter()
            .filter(|entry| entry.request_id.as_deref() == Some(request_id))
            .collect())
    }

    /// Verdicts recorded against one request, in level order
    pub fn decisions_for(
        &self,
        request_id: &str,
    ) -> Result<Vec<ApprovalDecision>, WorkflowError> {
        self.ledger.decisions_for(request_id)
    }

    /// Vendor record including its payment aggregates
    pub fn vendor(&self, vendor_id: &str) -> Result<Option<Vendor>, WorkflowError> {
        self.ledger.load_vendor(vendor_id)
    }

    pub fn vendors(&self) -> Result<Vec<Vendor>, WorkflowError> {
        self.ledger.vendors()
    }
}
