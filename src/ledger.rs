//! Durable ledger over sled
//!
//! All entities live in the default tree under key prefixes:
//!
//! - `req/{id}`            payment requests
//! - `vnd/{id}`            vendors
//! - `dec/{req_id}/{lvl}`  approval decisions, one per (request, level)
//! - `aud/{id}`            audit entries (uuid7 ids sort chronologically)
//! - `agg/status/{label}`  running totals per request status
//!
//! Every mutation runs in a single sled transaction so the entity write,
//! its audit entry and the aggregate buckets commit or fail as one unit.
use super::audit::AuditEntry;
use super::error::WorkflowError;
use super::request::{ApprovalDecision, PaymentRequest, RequestStatus, TimeStamp};
use super::vendor::Vendor;
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_PREFIX: &str = "req/";
const VENDOR_PREFIX: &str = "vnd/";
const DECISION_PREFIX: &str = "dec/";
const AUDIT_PREFIX: &str = "aud/";
const STATUS_AGG_PREFIX: &str = "agg/status/";

const COMMIT_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(10);

fn request_key(id: &str) -> String {
    format!("{REQUEST_PREFIX}{id}")
}
fn vendor_key(id: &str) -> String {
    format!("{VENDOR_PREFIX}{id}")
}
fn decision_key(request_id: &str, level: u32) -> String {
    format!("{DECISION_PREFIX}{request_id}/{level:03}")
}
fn audit_key(id: &str) -> String {
    format!("{AUDIT_PREFIX}{id}")
}
fn status_agg_key(status: RequestStatus) -> String {
    format!("{STATUS_AGG_PREFIX}{}", status.label())
}

/// Running sum/count for one request status bucket
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct StatusTotals {
    #[n(0)]
    pub count: u64,
    #[n(1)]
    pub amount_cents: u64,
}

/// Outcome of an optimistic transition commit. A conflict means another
/// writer got there first; the caller reloads and re-validates.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CommitOutcome {
    Committed,
    VersionConflict,
}

/// A completed payment to credit against a vendor's running aggregates.
/// Applied as a delta inside the commit transaction, never as a
/// read-outside-write-inside record, so concurrent completions for the
/// same vendor each land.
pub struct VendorCredit {
    pub vendor_id: String,
    pub amount_cents: u64,
    pub paid_at: TimeStamp<Utc>,
}

/// One transition's writes, committed atomically. `request` carries the
/// post-transition state with its version already bumped;
/// `expected_version` is the version that was loaded.
pub struct TransitionWrite<'a> {
    pub request: &'a PaymentRequest,
    pub expected_version: u64,
    pub previous_status: RequestStatus,
    pub audit: &'a AuditEntry,
    pub decision: Option<&'a ApprovalDecision>,
    pub vendor_credit: Option<&'a VendorCredit>,
}

#[derive(Clone)]
pub struct LedgerStore {
    instance: Arc<sled::Db>,
}

type TxResult<T> = Result<T, ConflictableTransactionError<WorkflowError>>;

fn abort<T>(err: WorkflowError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn tx_encode<T: minicbor::Encode<()>>(value: &T) -> TxResult<Vec<u8>> {
    minicbor::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(WorkflowError::Persistence(e.to_string())))
}

fn tx_decode<T: for<'b> minicbor::Decode<'b, ()>>(raw: &[u8]) -> TxResult<T> {
    minicbor::decode(raw)
        .map_err(|e| ConflictableTransactionError::Abort(WorkflowError::Persistence(e.to_string())))
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(raw: &[u8]) -> Result<T, WorkflowError> {
    minicbor::decode(raw).map_err(|e| WorkflowError::Persistence(e.to_string()))
}

fn unwrap_tx<T>(res: Result<T, TransactionError<WorkflowError>>) -> Result<T, WorkflowError> {
    match res {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(WorkflowError::Persistence(err.to_string())),
    }
}

// Move `amount` between status aggregate buckets inside a transaction.
// Reads, adjusts and rewrites each bucket, so the cost per transition is
// constant regardless of ledger size.
fn shift_totals(
    tx: &TransactionalTree,
    from: Option<RequestStatus>,
    to: RequestStatus,
    amount_cents: u64,
) -> TxResult<()> {
    if let Some(from) = from {
        let key = status_agg_key(from);
        let mut totals: StatusTotals = match tx.get(key.as_bytes())? {
            Some(raw) => tx_decode(&raw)?,
            None => StatusTotals::default(),
        };
        totals.count = totals.count.saturating_sub(1);
        totals.amount_cents = totals.amount_cents.saturating_sub(amount_cents);
        tx.insert(key.as_bytes(), tx_encode(&totals)?)?;
    }

    let key = status_agg_key(to);
    let mut totals: StatusTotals = match tx.get(key.as_bytes())? {
        Some(raw) => tx_decode(&raw)?,
        None => StatusTotals::default(),
    };
    totals.count += 1;
    totals.amount_cents += amount_cents;
    tx.insert(key.as_bytes(), tx_encode(&totals)?)?;

    Ok(())
}

impl LedgerStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    pub fn load_request(&self, id: &str) -> Result<Option<PaymentRequest>, WorkflowError> {
        match self.instance.get(request_key(id).as_bytes())? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn load_vendor(&self, id: &str) -> Result<Option<Vendor>, WorkflowError> {
        match self.instance.get(vendor_key(id).as_bytes())? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn requests(&self) -> Result<Vec<PaymentRequest>, WorkflowError> {
        self.scan(REQUEST_PREFIX)
    }

    pub fn vendors(&self) -> Result<Vec<Vendor>, WorkflowError> {
        self.scan(VENDOR_PREFIX)
    }

    /// Decisions recorded for a request, in level order (the key embeds a
    /// zero-padded level, so the scan is already sorted)
    pub fn decisions_for(&self, request_id: &str) -> Result<Vec<ApprovalDecision>, WorkflowError> {
        self.scan(&format!("{DECISION_PREFIX}{request_id}/"))
    }

    /// The full audit trail in chronological order. Entry ids are uuid7,
    /// so key order is time order.
    pub fn audit_entries(&self) -> Result<Vec<AuditEntry>, WorkflowError> {
        self.scan(AUDIT_PREFIX)
    }

    pub fn status_totals(&self, status: RequestStatus) -> Result<StatusTotals, WorkflowError> {
        match self.instance.get(status_agg_key(status).as_bytes())? {
            Some(raw) => decode(&raw),
            None => Ok(StatusTotals::default()),
        }
    }

    fn scan<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        prefix: &str,
    ) -> Result<Vec<T>, WorkflowError> {
        let mut out = Vec::new();
        for pair in self.instance.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = pair?;
            out.push(decode(&raw)?);
        }
        Ok(out)
    }

    /// Persist a freshly submitted request together with its audit entry
    /// and the pending-bucket aggregate bump.
    pub fn commit_submit(
        &self,
        request: &PaymentRequest,
        audit: &AuditEntry,
    ) -> Result<(), WorkflowError> {
        let res = self.instance.transaction(|tx| {
            tx.insert(request_key(&request.id).as_bytes(), tx_encode(request)?)?;
            tx.insert(audit_key(&audit.id).as_bytes(), tx_encode(audit)?)?;
            shift_totals(tx, None, request.status, request.amount_cents)?;
            Ok(())
        });
        unwrap_tx(res)
    }

    /// Persist one state transition atomically: the request (guarded by a
    /// version compare), its audit entry, an optional decision record, an
    /// optional vendor credit, and the status bucket move. The credit is
    /// folded into the stored vendor record inside the transaction, so
    /// two completions against the same vendor serialize instead of one
    /// overwriting the other.
    pub fn commit_transition(
        &self,
        write: &TransitionWrite<'_>,
    ) -> Result<CommitOutcome, WorkflowError> {
        let res = self.instance.transaction(|tx| {
            let key = request_key(&write.request.id);
            let stored: PaymentRequest = match tx.get(key.as_bytes())? {
                Some(raw) => tx_decode(&raw)?,
                None => return abort(WorkflowError::NotFound(write.request.id.clone())),
            };
            if stored.version != write.expected_version {
                return Ok(CommitOutcome::VersionConflict);
            }

            tx.insert(key.as_bytes(), tx_encode(write.request)?)?;
            tx.insert(audit_key(&write.audit.id).as_bytes(), tx_encode(write.audit)?)?;
            if let Some(decision) = write.decision {
                tx.insert(
                    decision_key(&decision.request_id, decision.level).as_bytes(),
                    tx_encode(decision)?,
                )?;
            }
            if let Some(credit) = write.vendor_credit {
                let vkey = vendor_key(&credit.vendor_id);
                let mut vendor: Vendor = match tx.get(vkey.as_bytes())? {
                    Some(raw) => tx_decode(&raw)?,
                    None => return abort(WorkflowError::NotFound(credit.vendor_id.clone())),
                };
                vendor.total_payments_cents += credit.amount_cents;
                vendor.last_payment_date = Some(credit.paid_at.clone());
                tx.insert(vkey.as_bytes(), tx_encode(&vendor)?)?;
            }
            if write.previous_status != write.request.status {
                shift_totals(
                    tx,
                    Some(write.previous_status),
                    write.request.status,
                    write.request.amount_cents,
                )?;
            }
            Ok(CommitOutcome::Committed)
        });
        unwrap_tx(res)
    }

    /// Persist a vendor record together with its audit entry
    pub fn commit_vendor(&self, vendor: &Vendor, audit: &AuditEntry) -> Result<(), WorkflowError> {
        let res = self.instance.transaction(|tx| {
            tx.insert(vendor_key(&vendor.id).as_bytes(), tx_encode(vendor)?)?;
            tx.insert(audit_key(&audit.id).as_bytes(), tx_encode(audit)?)?;
            Ok(())
        });
        unwrap_tx(res)
    }
}

/// Retry a commit on transient storage failure with exponential backoff.
/// Validation errors pass through untouched; exhausting the attempts
/// surfaces the last `Persistence` error and leaves prior state visible.
pub fn retry_commit<T>(op: impl Fn() -> Result<T, WorkflowError>) -> Result<T, WorkflowError> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(err) if err.is_transient() && attempt + 1 < COMMIT_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "ledger commit failed, retrying");
                std::thread::sleep(BACKOFF_BASE * 2u32.pow(attempt));
                attempt += 1;
            }
            other => return other,
        }
    }
}
