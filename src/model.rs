//! Core domain entities: `Contact`, `List`, `Campaign`, `Device`, `Attempt`,
//! `InboundRecord`, and the E.164 `Msisdn` wrapper. These are plain data —
//! persistence and identity assignment belong to the external store reached
//! through [`crate::ports`].
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscriber number in E.164 form: a leading `+` followed by 7–15 digits.
///
/// Construction validates the grammar in §3 of the data model; it does not
/// perform the fuller libphonenumber-backed validation the inbound handler
/// applies to freshly-received numbers (see [`crate::inbound::normalize_msisdn`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Msisdn(String);

impl Msisdn {
    /// Validate and wrap a string already believed to be E.164.
    pub fn parse(s: impl Into<String>) -> Result<Self, MsisdnError> {
        let s = s.into();
        let digits = s.strip_prefix('+').ok_or(MsisdnError::MissingPlus)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MsisdnError::NonDigits);
        }
        if !(7..=15).contains(&digits.len()) {
            return Err(MsisdnError::WrongLength(digits.len()));
        }
        Ok(Msisdn(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a string failed to validate as an E.164 MSISDN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MsisdnError {
    #[error("MSISDN must start with '+'")]
    MissingPlus,
    #[error("MSISDN must contain only digits after '+'")]
    NonDigits,
    #[error("MSISDN must have 7-15 digits, got {0}")]
    WrongLength(usize),
}

/// A contact, identified uniquely by `msisdn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub msisdn: Msisdn,
    /// Descriptive only; never consulted by core logic. Present in
    /// `original_source`'s `Contact` model but outside the distilled spec's
    /// invariants.
    pub name: Option<String>,
    pub opt_out: bool,
}

/// A named set of contacts (membership lives in the external store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactList {
    pub id: i64,
    pub name: String,
}

/// The optional quiet-hour window a campaign sends within, both ends
/// wall-clock UTC. Either both are present or neither is (see
/// [`Campaign::window`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A send campaign. Immutable once created; the dispatcher only appends
/// `Attempt` rows, never mutates the campaign itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub template: String,
    pub list_id: i64,
    pub start_time: DateTime<Utc>,
    pub window: Option<SendWindow>,
    /// Messages per second per device. Must be >= 1; enforced at
    /// construction by [`Campaign::new`].
    pub rate_limit: u32,
}

impl Campaign {
    pub fn new(
        id: i64,
        name: String,
        template: String,
        list_id: i64,
        start_time: DateTime<Utc>,
        window: Option<SendWindow>,
        rate_limit: u32,
    ) -> Self {
        assert!(rate_limit >= 1, "rate_limit must be >= 1 message/s/device");
        Campaign {
            id,
            name,
            template,
            list_id,
            start_time,
            window,
            rate_limit,
        }
    }
}

/// A modem bound to a serial port path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub port: String,
    pub active: bool,
}

/// Lifecycle state of an outbound [`Attempt`]. `Delivered` and `Failed` are
/// terminal; `Unknown` is a non-terminal placeholder for status codes the
/// codec did not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
    Unknown,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Delivered | AttemptStatus::Failed)
    }
}

/// One outbound send and its eventual delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub contact_id: i64,
    pub device_id: i64,
    pub text: String,
    /// Modem-assigned message reference of the first segment, used to
    /// reconcile a later status report (see [`crate::reconciler`]).
    pub reference: Option<String>,
    pub status: AttemptStatus,
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A received inbound message, recorded independent of any keyword handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRecord {
    pub msisdn: Msisdn,
    pub text: String,
    pub device_id: i64,
    pub received_at: DateTime<Utc>,
}

/// An operator-configured keyword → auto-reply pair, consulted by the
/// inbound handler after the fixed `STOP`/`INFO` built-ins (see
/// SPEC_FULL.md §2, C4a). Matching is case-insensitive on the trimmed
/// inbound text, same as the built-ins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRule {
    pub keyword: String,
    pub response: String,
}
