//! Property-based tests for the approval chain resolver
//!
//! The resolver is the one pure function the whole workflow hangs off:
//! the chain it returns is frozen onto every request at submission. These
//! properties pin down determinism and the threshold structure across the
//! full input space rather than hand-picked amounts.

use payment_approval::chain::{ChainPolicy, Role};
use payment_approval::error::WorkflowError;
use payment_approval::request::Category;
use proptest::prelude::*;

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

proptest! {
    /// Property: same (category, amount) always resolves to the same chain
    #[test]
    fn prop_resolver_is_deterministic(
        category in category_strategy(),
        amount in 1u64..100_000_000,
    ) {
        let policy = ChainPolicy::default();

        let first = policy.resolve_chain(category, amount).unwrap();
        let second = policy.resolve_chain(category, amount).unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: chain length never decreases as the amount grows
    /// (holds for the default policy, which has no category overrides)
    #[test]
    fn prop_chain_length_monotonic_in_amount(
        category in category_strategy(),
        a in 1u64..100_000_000,
        b in 1u64..100_000_000,
    ) {
        let policy = ChainPolicy::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let short = policy.resolve_chain(category, lo).unwrap();
        let long = policy.resolve_chain(category, hi).unwrap();

        prop_assert!(short.len() <= long.len());
    }

    /// Property: every chain is a non-empty prefix of the full escalation
    /// order department-head -> finance-manager -> executive
    #[test]
    fn prop_chain_is_prefix_of_escalation_order(
        category in category_strategy(),
        amount in 1u64..100_000_000,
    ) {
        let policy = ChainPolicy::default();
        let chain = policy.resolve_chain(category, amount).unwrap();

        let full = [Role::DepartmentHead, Role::FinanceManager, Role::Executive];
        prop_assert!(!chain.is_empty());
        prop_assert!(chain.len() <= full.len());
        prop_assert_eq!(&chain[..], &full[..chain.len()]);
    }

    /// Property: a zero amount always fails with InvalidAmount, for every
    /// category and also under arbitrary thresholds
    #[test]
    fn prop_zero_amount_always_rejected(
        category in category_strategy(),
        low in 1u64..1_000_000,
        spread in 1u64..1_000_000,
    ) {
        let policy = ChainPolicy {
            low_threshold_cents: low,
            high_threshold_cents: low + spread,
            executive_categories: vec![],
        };

        prop_assert!(matches!(
            policy.resolve_chain(category, 0),
            Err(WorkflowError::InvalidAmount)
        ));
    }

    /// Property: an executive-category override always yields the full
    /// chain, no matter how small the amount is
    #[test]
    fn prop_executive_category_forces_full_chain(
        category in category_strategy(),
        amount in 1u64..100_000_000,
    ) {
        let policy = ChainPolicy {
            executive_categories: vec![category],
            ..ChainPolicy::default()
        };

        let chain = policy.resolve_chain(category, amount).unwrap();
        prop_assert_eq!(chain.len(), 3);
    }
}
