//! Property-based tests for the workflow state machine
//!
//! These run against a real sled-backed engine, so the case count is kept
//! low; each case opens its own temporary database. The invariants under
//! test are the load-bearing ones: the frozen chain, level monotonicity,
//! terminal-state stability, and the one-audit-entry-per-transition rule.

use payment_approval::{
    chain::{ChainPolicy, Role},
    error::WorkflowError,
    query::RequestFilter,
    request::{Category, Decision, RequestStatus, Urgency},
    service::{Approver, WorkflowEngine},
    vendor::VendorDraft,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;

fn category_strategy() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::OfficeSupplies),
        Just(Category::Software),
        Just(Category::Consulting),
        Just(Category::Marketing),
        Just(Category::Utilities),
        Just(Category::Other),
    ]
}

fn approver_for(level: usize, role: Role) -> Approver {
    Approver {
        id: format!("user_level{level}"),
        role,
    }
}

// Fresh engine with one active vendor, on its own temp database
fn engine_with_vendor(
    dir: &tempfile::TempDir,
) -> anyhow::Result<(WorkflowEngine, String)> {
    let db = sled::open(dir.path().join("prop.db"))?;
    let engine = WorkflowEngine::new(Arc::new(db), ChainPolicy::default());
    let vendor = engine.add_vendor(
        VendorDraft::new()
            .set_name("Prop Vendor Inc.")
            .set_tax_id("00-0000000"),
        "user_admin",
    )?;
    Ok((engine, vendor.id))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: walking the whole chain with the correct roles keeps the
    /// level monotonically non-decreasing, never mutates the frozen chain,
    /// ends in Approved, and appends exactly one audit entry per transition
    #[test]
    fn prop_full_approval_walk(
        amount in 1u64..50_000_000,
        category in category_strategy(),
    ) {
        let temp_dir = tempdir().unwrap();
        let (engine, vendor_id) = engine_with_vendor(&temp_dir).unwrap();

        let request = engine
            .submit_request(&vendor_id, amount, category, "prop", Urgency::Normal, "user_req")
            .unwrap();

        let expected_chain = ChainPolicy::default().resolve_chain(category, amount).unwrap();
        prop_assert_eq!(&request.approval_chain, &expected_chain);
        prop_assert_eq!(request.status, RequestStatus::Pending);
        prop_assert_eq!(request.current_level, 0);

        let mut last_level = 0;
        let mut current = request.clone();
        for (level, role) in expected_chain.iter().enumerate() {
            current = engine
                .record_decision(&current.id, &approver_for(level, *role), Decision::Approve, None)
                .unwrap();

            prop_assert!(current.current_level >= last_level);
            prop_assert_eq!(&current.approval_chain, &expected_chain);
            last_level = current.current_level;
        }

        prop_assert_eq!(current.status, RequestStatus::Approved);

        // one submit entry plus one per approval
        let trail = engine.queries().audit_entries_for(&current.id).unwrap();
        prop_assert_eq!(trail.len(), 1 + expected_chain.len());
    }

    /// Property: a rejection at any level is terminal; every later verdict
    /// fails with InvalidState and the stored request never changes again
    #[test]
    fn prop_rejection_is_terminal(
        amount in 1u64..50_000_000,
        category in category_strategy(),
        reject_at in 0usize..3,
    ) {
        let temp_dir = tempdir().unwrap();
        let (engine, vendor_id) = engine_with_vendor(&temp_dir).unwrap();

        let request = engine
            .submit_request(&vendor_id, amount, category, "prop", Urgency::Low, "user_req")
            .unwrap();
        let chain = request.approval_chain.clone();
        let reject_at = reject_at.min(chain.len() - 1);

        for (level, role) in chain.iter().enumerate().take(reject_at) {
            engine
                .record_decision(&request.id, &approver_for(level, *role), Decision::Approve, None)
                .unwrap();
        }
        let rejected = engine
            .record_decision(
                &request.id,
                &approver_for(reject_at, chain[reject_at]),
                Decision::Reject,
                Some("nope"),
            )
            .unwrap();
        prop_assert_eq!(rejected.status, RequestStatus::Rejected);

        for (level, role) in chain.iter().enumerate() {
            let err = engine
                .record_decision(&request.id, &approver_for(level, *role), Decision::Approve, None)
                .unwrap_err();
            prop_assert!(matches!(err, WorkflowError::InvalidState { .. }), "expected InvalidState, got {:?}", err);
        }
        let err = engine.mark_processing(&request.id, "user_system").unwrap_err();
        prop_assert!(matches!(err, WorkflowError::InvalidState { .. }), "expected InvalidState, got {:?}", err);

        let stored = &engine.list_requests(&RequestFilter::default()).unwrap()[0];
        prop_assert_eq!(stored, &rejected);
    }

    /// Property: a wrong-role verdict fails Unauthorized and leaves the
    /// stored request byte-for-byte unchanged
    #[test]
    fn prop_unauthorized_never_mutates(
        amount in 1u64..50_000_000,
        category in category_strategy(),
    ) {
        let temp_dir = tempdir().unwrap();
        let (engine, vendor_id) = engine_with_vendor(&temp_dir).unwrap();

        let request = engine
            .submit_request(&vendor_id, amount, category, "prop", Urgency::High, "user_req")
            .unwrap();

        // level 0 always expects the department head
        let intruder = Approver {
            id: "user_intruder".into(),
            role: Role::Executive,
        };
        let err = engine
            .record_decision(&request.id, &intruder, Decision::Approve, None)
            .unwrap_err();
        prop_assert!(matches!(err, WorkflowError::Unauthorized { .. }), "expected Unauthorized, got {:?}", err);

        let stored = &engine.list_requests(&RequestFilter::default()).unwrap()[0];
        prop_assert_eq!(stored, &request);

        // the failed attempt wrote no audit entry
        let trail = engine.queries().audit_entries_for(&request.id).unwrap();
        prop_assert_eq!(trail.len(), 1);
    }

    /// Property: status aggregates always account for every request once
    #[test]
    fn prop_status_totals_conserve_requests(
        amounts in prop::collection::vec(1u64..5_000_000, 1..6),
    ) {
        let temp_dir = tempdir().unwrap();
        let (engine, vendor_id) = engine_with_vendor(&temp_dir).unwrap();

        for amount in &amounts {
            engine
                .submit_request(&vendor_id, *amount, Category::Other, "prop", Urgency::Normal, "user_req")
                .unwrap();
        }

        let totals = engine.queries().totals_by_status().unwrap();
        let count: u64 = totals.iter().map(|(_, t)| t.count).sum();
        let sum: u64 = totals.iter().map(|(_, t)| t.amount_cents).sum();

        prop_assert_eq!(count, amounts.len() as u64);
        prop_assert_eq!(sum, amounts.iter().sum::<u64>());
    }
}
