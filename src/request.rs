//! Payment request record and its lifecycle types
use super::chain::Role;
use chrono::{DateTime, TimeZone, Utc};

/// Request lifecycle. `Rejected` and `Completed` are terminal; nothing may
/// mutate a request once it reaches either.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Processing,
    #[n(4)]
    Completed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Completed)
    }
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
        }
    }
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Processing,
        RequestStatus::Completed,
    ];
}

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[n(0)]
    OfficeSupplies,
    #[n(1)]
    Software,
    #[n(2)]
    Consulting,
    #[n(3)]
    Marketing,
    #[n(4)]
    Utilities,
    #[n(5)]
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::OfficeSupplies => "office-supplies",
            Category::Software => "software",
            Category::Consulting => "consulting",
            Category::Marketing => "marketing",
            Category::Utilities => "utilities",
            Category::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "office-supplies" => Ok(Category::OfficeSupplies),
            "software" => Ok(Category::Software),
            "consulting" => Ok(Category::Consulting),
            "marketing" => Ok(Category::Marketing),
            "utilities" => Ok(Category::Utilities),
            "other" => Ok(Category::Other),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Urgency {
    #[n(0)]
    Low,
    #[n(1)]
    Normal,
    #[n(2)]
    High,
    #[n(3)]
    Urgent,
}

impl Urgency {
    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
            Urgency::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            "urgent" => Ok(Urgency::Urgent),
            _ => Err(format!("unknown urgency: {s}")),
        }
    }
}

/// An approver's verdict at one level of the chain
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Decision {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
}

/// One recorded verdict, immutable once written. Keyed in the ledger by
/// (request id, level) so a level can never carry two decisions.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct ApprovalDecision {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub level: u32,
    #[n(2)]
    pub actor_id: String,
    #[n(3)]
    pub decision: Decision,
    #[n(4)]
    pub comment: Option<String>,
    #[n(5)]
    pub decided_at: TimeStamp<Utc>,
}

// The record the workflow engine owns. Mutated only through the engine;
// everything else reads it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct PaymentRequest {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded with "req_"
    #[n(1)]
    pub vendor_id: String,
    #[n(2)]
    pub amount_cents: u64, // Use integers for currency
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub category: Category,
    #[n(5)]
    pub urgency: Urgency,
    #[n(6)]
    pub requested_by: String,
    #[n(7)]
    pub status: RequestStatus,
    #[n(8)]
    pub current_level: u32,
    #[n(9)]
    pub approval_chain: Vec<Role>, // resolved once at submission, frozen
    #[n(10)]
    pub submitted_at: TimeStamp<Utc>,
    #[n(11)]
    pub version: u64, // bumped on every write, compared on commit
}

impl PaymentRequest {
    /// The role whose approval the request is currently waiting on.
    /// `None` once the chain is exhausted or the request left `Pending`.
    pub fn expected_role(&self) -> Option<Role> {
        if self.status != RequestStatus::Pending {
            return None;
        }
        self.approval_chain.get(self.current_level as usize).copied()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Ordering is implemented by hand for the same reason the minicbor codecs
// are: a derive would demand the bound on the timezone marker itself, and
// `Utc` carries no ordering.
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
