//! Approval chain resolution
//!
//! Maps a request's `(category, amount)` onto the ordered list of roles
//! that must sign off before disbursement. The mapping is pure: the same
//! inputs always produce the same chain, and the engine freezes the result
//! onto the request at submission time.
use super::error::WorkflowError;
use super::request::Category;
use serde::Deserialize;

/// Approver roles, ordered by escalation tier
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[n(0)]
    DepartmentHead,
    #[n(1)]
    FinanceManager,
    #[n(2)]
    Executive,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::DepartmentHead => "department-head",
            Role::FinanceManager => "finance-manager",
            Role::Executive => "executive",
        }
    }
}

/// Threshold policy for chain length. The defaults are a starting point,
/// not a business rule; deployments load their own from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainPolicy {
    /// Below this, a department-head signature is enough
    pub low_threshold_cents: u64,
    /// At or above this, the executive tier is added
    pub high_threshold_cents: u64,
    /// Categories that always require the full chain regardless of amount
    pub executive_categories: Vec<Category>,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            low_threshold_cents: 100_000,    // $1,000
            high_threshold_cents: 1_000_000, // $10,000
            executive_categories: vec![],
        }
    }
}

impl ChainPolicy {
    /// Parse a policy from a TOML document. Missing keys fall back to the
    /// defaults, so a partial override file is valid.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Resolve the ordered approver chain for a request.
    ///
    /// Fails with `InvalidAmount` on a zero amount; amounts are unsigned
    /// integer cents so zero is the only non-positive input.
    pub fn resolve_chain(
        &self,
        category: Category,
        amount_cents: u64,
    ) -> Result<Vec<Role>, WorkflowError> {
        if amount_cents == 0 {
            return Err(WorkflowError::InvalidAmount);
        }

        if amount_cents >= self.high_threshold_cents || self.executive_categories.contains(&category)
        {
            return Ok(vec![
                Role::DepartmentHead,
                Role::FinanceManager,
                Role::Executive,
            ]);
        }
        if amount_cents >= self.low_threshold_cents {
            return Ok(vec![Role::DepartmentHead, Role::FinanceManager]);
        }
        Ok(vec![Role::DepartmentHead])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_amount_needs_only_department_head() {
        let policy = ChainPolicy::default();
        let chain = policy
            .resolve_chain(Category::OfficeSupplies, 50_000)
            .unwrap();

        assert_eq!(chain, vec![Role::DepartmentHead]);
    }

    #[test]
    fn large_amount_needs_full_chain() {
        let policy = ChainPolicy::default();
        let chain = policy.resolve_chain(Category::Software, 1_500_000).unwrap();

        assert_eq!(
            chain,
            vec![Role::DepartmentHead, Role::FinanceManager, Role::Executive]
        );
    }

    #[test]
    fn zero_amount_is_rejected() {
        let policy = ChainPolicy::default();

        assert!(matches!(
            policy.resolve_chain(Category::Other, 0),
            Err(WorkflowError::InvalidAmount)
        ));
    }

    #[test]
    fn executive_category_overrides_amount() {
        let policy = ChainPolicy {
            executive_categories: vec![Category::Consulting],
            ..ChainPolicy::default()
        };
        let chain = policy.resolve_chain(Category::Consulting, 10_000).unwrap();

        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn policy_loads_partial_toml() {
        let policy =
            ChainPolicy::from_toml_str("low_threshold_cents = 250000\n").expect("valid toml");

        assert_eq!(policy.low_threshold_cents, 250_000);
        assert_eq!(policy.high_threshold_cents, 1_000_000);
    }
}
