//! Service layer API for payment workflow operations
//!
//! The engine holds no request state between calls: every operation loads
//! from the ledger, validates, mutates and commits, so multiple replicas
//! can drive the same store. Writes for one transition (request, audit
//! entry, decision, aggregates) land in a single storage transaction.
use super::audit::{AuditAction, AuditEntry, AuditFilter, ResultStatus};
use super::chain::{ChainPolicy, Role};
use super::error::WorkflowError;
use super::ledger::{CommitOutcome, LedgerStore, TransitionWrite, VendorCredit, retry_commit};
use super::query::{QueryService, RequestFilter};
use super::request::{
    ApprovalDecision, Category, Decision, PaymentRequest, RequestStatus, TimeStamp, Urgency,
};
use super::utils::{format_amount, new_uuid_to_bech32};
use super::vendor::{Vendor, VendorDraft, VendorStatus, VendorUpdate};
use std::sync::Arc;

// Bound on load-validate-commit rounds when concurrent writers contend on
// one request. One conflict consumes one round; the re-validation after a
// lost race is what turns the loser into a typed InvalidState/Unauthorized.
const CONTENTION_ATTEMPTS: u32 = 3;

/// Authenticated approver identity, resolved by the calling layer
#[derive(Debug, Clone)]
pub struct Approver {
    pub id: String,
    pub role: Role,
}

struct TransitionEffects {
    audit: AuditEntry,
    decision: Option<ApprovalDecision>,
    vendor_credit: Option<VendorCredit>,
}

#[derive(Clone)]
pub struct WorkflowEngine {
    ledger: LedgerStore,
    policy: ChainPolicy,
    query: QueryService,
}

impl WorkflowEngine {
    pub fn new(instance: Arc<sled::Db>, policy: ChainPolicy) -> Self {
        let ledger = LedgerStore::new(instance);
        let query = QueryService::new(ledger.clone());
        Self {
            ledger,
            policy,
            query,
        }
    }

    /// Read-side views built over the same ledger
    pub fn queries(&self) -> &QueryService {
        &self.query
    }

    /// Submit a new payment request. The approval chain is resolved here
    /// once and frozen onto the request for its whole life.
    pub fn submit_request(
        &self,
        vendor_id: &str,
        amount_cents: u64,
        category: Category,
        description: &str,
        urgency: Urgency,
        requested_by: &str,
    ) -> Result<PaymentRequest, WorkflowError> {
        let approval_chain = self.policy.resolve_chain(category, amount_cents)?;

        let vendor = self
            .ledger
            .load_vendor(vendor_id)?
            .filter(Vendor::is_active)
            .ok_or_else(|| WorkflowError::InvalidVendor(vendor_id.to_string()))?;

        let id = new_uuid_to_bech32("req_")
            .map_err(|e| WorkflowError::Persistence(e.to_string()))?;

        let request = PaymentRequest {
            id: id.clone(),
            vendor_id: vendor_id.to_string(),
            amount_cents,
            description: description.to_string(),
            category,
            urgency,
            requested_by: requested_by.to_string(),
            status: RequestStatus::Pending,
            current_level: 0,
            approval_chain,
            submitted_at: TimeStamp::new(),
            version: 1,
        };

        let audit = AuditEntry::new(
            AuditAction::RequestSubmitted,
            requested_by.to_string(),
            Some(id.clone()),
            format!(
                "New payment request for {} - {}",
                vendor.name,
                format_amount(amount_cents)
            ),
            ResultStatus::Success,
        );

        retry_commit(|| self.ledger.commit_submit(&request, &audit))?;

        tracing::info!(
            request_id = %request.id,
            vendor_id,
            amount_cents,
            chain_len = request.approval_chain.len(),
            "payment request submitted"
        );
        Ok(request)
    }

    /// Record an approver's verdict at the request's current level.
    ///
    /// An approval either advances the level (more signatures needed) or
    /// moves the request to `Approved`; a rejection is terminal.
    pub fn record_decision(
        &self,
        request_id: &str,
        actor: &Approver,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<PaymentRequest, WorkflowError> {
        let request = self.run_transition(request_id, |request| {
            let Some(expected) = request.expected_role() else {
                return Err(WorkflowError::InvalidState {
                    id: request.id.clone(),
                    status: request.status,
                    attempted: "record a decision",
                });
            };
            if actor.role != expected {
                return Err(WorkflowError::Unauthorized {
                    actor: actor.id.clone(),
                    expected,
                    level: request.current_level,
                });
            }

            let level = request.current_level;
            let record = ApprovalDecision {
                request_id: request.id.clone(),
                level,
                actor_id: actor.id.clone(),
                decision,
                comment: comment.map(str::to_string),
                decided_at: TimeStamp::new(),
            };

            let audit = match decision {
                Decision::Approve => {
                    if (level as usize) + 1 < request.approval_chain.len() {
                        request.current_level += 1;
                    } else {
                        request.status = RequestStatus::Approved;
                    }
                    let outcome = match request.expected_role() {
                        Some(next) => format!("awaiting {}", next.label()),
                        None => "request fully approved".to_string(),
                    };
                    AuditEntry::new(
                        AuditAction::LevelApproval,
                        actor.id.clone(),
                        Some(request.id.clone()),
                        format!(
                            "Level {} approval by {} ({}) - {outcome}",
                            level + 1,
                            actor.id,
                            actor.role.label()
                        ),
                        ResultStatus::Success,
                    )
                }
                Decision::Reject => {
                    request.status = RequestStatus::Rejected;
                    let reason = comment
                        .map(|c| format!(" - {c}"))
                        .unwrap_or_default();
                    AuditEntry::new(
                        AuditAction::RequestRejected,
                        actor.id.clone(),
                        Some(request.id.clone()),
                        format!("Rejected payment request at level {}{reason}", level + 1),
                        ResultStatus::Failed,
                    )
                }
            };

            Ok(TransitionEffects {
                audit,
                decision: Some(record),
                vendor_credit: None,
            })
        })?;

        tracing::info!(
            request_id,
            actor = %actor.id,
            ?decision,
            status = request.status.label(),
            level = request.current_level,
            "decision recorded"
        );
        Ok(request)
    }

    /// Hand an approved request to payment execution
    pub fn mark_processing(
        &self,
        request_id: &str,
        actor_id: &str,
    ) -> Result<PaymentRequest, WorkflowError> {
        let request = self.run_transition(request_id, |request| {
            if request.status != RequestStatus::Approved {
                return Err(WorkflowError::InvalidState {
                    id: request.id.clone(),
                    status: request.status,
                    attempted: "start processing",
                });
            }
            request.status = RequestStatus::Processing;

            Ok(TransitionEffects {
                audit: AuditEntry::new(
                    AuditAction::PaymentProcessing,
                    actor_id.to_string(),
                    Some(request.id.clone()),
                    format!(
                        "Payment of {} entering disbursement",
                        format_amount(request.amount_cents)
                    ),
                    ResultStatus::Success,
                ),
                decision: None,
                vendor_credit: None,
            })
        })?;

        tracing::info!(request_id, actor_id, "payment processing started");
        Ok(request)
    }

    /// Record a successful disbursement. The payment is credited to the
    /// vendor's aggregates inside the commit transaction, so concurrent
    /// completions for the same vendor all count.
    pub fn mark_completed(
        &self,
        request_id: &str,
        actor_id: &str,
    ) -> Result<PaymentRequest, WorkflowError> {
        let request = self.run_transition(request_id, |request| {
            if request.status != RequestStatus::Processing {
                return Err(WorkflowError::InvalidState {
                    id: request.id.clone(),
                    status: request.status,
                    attempted: "complete payment",
                });
            }
            let vendor = self
                .ledger
                .load_vendor(&request.vendor_id)?
                .ok_or_else(|| WorkflowError::NotFound(request.vendor_id.clone()))?;

            request.status = RequestStatus::Completed;

            Ok(TransitionEffects {
                audit: AuditEntry::new(
                    AuditAction::PaymentCompleted,
                    actor_id.to_string(),
                    Some(request.id.clone()),
                    format!(
                        "Payment of {} processed and sent to {}",
                        format_amount(request.amount_cents),
                        vendor.name
                    ),
                    ResultStatus::Success,
                ),
                decision: None,
                vendor_credit: Some(VendorCredit {
                    vendor_id: request.vendor_id.clone(),
                    amount_cents: request.amount_cents,
                    paid_at: TimeStamp::new(),
                }),
            })
        })?;

        tracing::info!(request_id, actor_id, "payment completed");
        Ok(request)
    }

    /// Record a failed disbursement. Terminal, with the failure reason on
    /// the audit trail.
    pub fn mark_failed(
        &self,
        request_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<PaymentRequest, WorkflowError> {
        let request = self.run_transition(request_id, |request| {
            if request.status != RequestStatus::Processing {
                return Err(WorkflowError::InvalidState {
                    id: request.id.clone(),
                    status: request.status,
                    attempted: "fail payment",
                });
            }
            request.status = RequestStatus::Rejected;

            Ok(TransitionEffects {
                audit: AuditEntry::new(
                    AuditAction::RequestRejected,
                    actor_id.to_string(),
                    Some(request.id.clone()),
                    format!("Payment execution failed: {reason}"),
                    ResultStatus::Failed,
                ),
                decision: None,
                vendor_credit: None,
            })
        })?;

        tracing::warn!(request_id, actor_id, reason, "payment execution failed");
        Ok(request)
    }

    /// Register a new vendor
    pub fn add_vendor(&self, draft: VendorDraft, actor_id: &str) -> Result<Vendor, WorkflowError> {
        let id = new_uuid_to_bech32("vnd_")
            .map_err(|e| WorkflowError::Persistence(e.to_string()))?;
        let vendor = draft.finalise(id)?;

        let audit = AuditEntry::new(
            AuditAction::VendorAdded,
            actor_id.to_string(),
            None,
            format!("New vendor '{}' added to system", vendor.name),
            ResultStatus::Success,
        );
        retry_commit(|| self.ledger.commit_vendor(&vendor, &audit))?;

        tracing::info!(vendor_id = %vendor.id, name = %vendor.name, "vendor added");
        Ok(vendor)
    }

    /// Patch a vendor's contact details
    pub fn update_vendor(
        &self,
        vendor_id: &str,
        update: &VendorUpdate,
        actor_id: &str,
    ) -> Result<Vendor, WorkflowError> {
        let mut vendor = self
            .ledger
            .load_vendor(vendor_id)?
            .ok_or_else(|| WorkflowError::NotFound(vendor_id.to_string()))?;
        update.apply(&mut vendor);

        let audit = AuditEntry::new(
            AuditAction::VendorUpdated,
            actor_id.to_string(),
            None,
            format!("Vendor '{}' details updated", vendor.name),
            ResultStatus::Success,
        );
        retry_commit(|| self.ledger.commit_vendor(&vendor, &audit))?;

        tracing::info!(vendor_id, "vendor updated");
        Ok(vendor)
    }

    /// Activate or deactivate a vendor. Inactive vendors cannot receive
    /// new requests; in-flight requests are unaffected.
    pub fn set_vendor_status(
        &self,
        vendor_id: &str,
        status: VendorStatus,
        actor_id: &str,
    ) -> Result<Vendor, WorkflowError> {
        let mut vendor = self
            .ledger
            .load_vendor(vendor_id)?
            .ok_or_else(|| WorkflowError::NotFound(vendor_id.to_string()))?;
        vendor.status = status;

        let audit = AuditEntry::new(
            AuditAction::VendorUpdated,
            actor_id.to_string(),
            None,
            format!("Vendor '{}' marked {}", vendor.name, status.label()),
            ResultStatus::Success,
        );
        retry_commit(|| self.ledger.commit_vendor(&vendor, &audit))?;

        tracing::info!(vendor_id, status = status.label(), "vendor status changed");
        Ok(vendor)
    }

    /// Requests matching the filter, newest first
    pub fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<PaymentRequest>, WorkflowError> {
        self.query.requests(filter)
    }

    /// Audit entries matching the filter, chronological
    pub fn list_audit_entries(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, WorkflowError> {
        self.query.audit_entries(filter)
    }

    // Optimistic load-validate-commit loop. A version conflict means some
    // other writer committed between our load and commit; reload and
    // re-validate so the caller gets the error the *new* state implies.
    fn run_transition(
        &self,
        request_id: &str,
        apply: impl Fn(&mut PaymentRequest) -> Result<TransitionEffects, WorkflowError>,
    ) -> Result<PaymentRequest, WorkflowError> {
        for _ in 0..CONTENTION_ATTEMPTS {
            let mut request = self
                .ledger
                .load_request(request_id)?
                .ok_or_else(|| WorkflowError::NotFound(request_id.to_string()))?;
            let expected_version = request.version;
            let previous_status = request.status;

            let effects = apply(&mut request)?;
            request.version += 1;

            let write = TransitionWrite {
                request: &request,
                expected_version,
                previous_status,
                audit: &effects.audit,
                decision: effects.decision.as_ref(),
                vendor_credit: effects.vendor_credit.as_ref(),
            };
            match retry_commit(|| self.ledger.commit_transition(&write))? {
                CommitOutcome::Committed => return Ok(request),
                CommitOutcome::VersionConflict => {
                    tracing::debug!(request_id, "lost a commit race, revalidating");
                }
            }
        }
        Err(WorkflowError::Persistence(format!(
            "request {request_id} contended beyond retry budget"
        )))
    }
}
