use crate::chain::Role;
use crate::request::RequestStatus;

/// Typed failures surfaced to the presentation layer. Callers are expected
/// to branch on the variant; retrying an `Unauthorized` or `InvalidState`
/// call cannot succeed, while `Persistence` means the store was unavailable.
#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("vendor {0} is unknown or inactive")]
    InvalidVendor(String),
    #[error("no record found for {0}")]
    NotFound(String),
    #[error("request {id} cannot {attempted} from state {status:?}")]
    InvalidState {
        id: String,
        status: RequestStatus,
        attempted: &'static str,
    },
    #[error("actor {actor} does not hold role {expected:?} required at level {level}")]
    Unauthorized {
        actor: String,
        expected: Role,
        level: u32,
    },
    #[error("storage failure: {0}")]
    Persistence(String),
}

impl WorkflowError {
    /// True for failures worth retrying with backoff. Validation failures
    /// are final by construction.
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowError::Persistence(_))
    }
}

impl From<sled::Error> for WorkflowError {
    fn from(value: sled::Error) -> Self {
        WorkflowError::Persistence(value.to_string())
    }
}
