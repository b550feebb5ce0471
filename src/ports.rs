//! External collaborator traits: everything this gateway needs from a
//! store and a notification sink, expressed as native `async fn` traits
//! rather than `dyn Trait` objects or the `async_trait` macro. Callers
//! (the dispatcher, the inbound handler, the reconciler) are generic over
//! `P: PersistencePort` / `N: NotificationPort`, so a binary wiring this
//! crate up picks its own concrete store and transport at the edge.
use crate::errors::PortError;
use crate::model::{Attempt, AttemptStatus, Contact, ContactList, Device, InboundRecord, Msisdn, ReplyRule};

/// Everything the gateway reads from or writes to the contact/campaign
/// store. HTTP exposure, auth, migrations, and CSV ingestion are the
/// concrete implementor's problem, not this trait's.
pub trait PersistencePort: Send + Sync {
    /// Look up a contact by MSISDN, if one has been recorded.
    fn find_contact(
        &self,
        msisdn: &Msisdn,
    ) -> impl std::future::Future<Output = Result<Option<Contact>, PortError>> + Send;

    /// Create a contact for a number seen for the first time on an
    /// inbound message, or return the existing one.
    fn upsert_contact(
        &self,
        msisdn: &Msisdn,
    ) -> impl std::future::Future<Output = Result<Contact, PortError>> + Send;

    /// Flip a contact's opt-out flag (set by the `STOP` keyword).
    fn set_opt_out(
        &self,
        contact_id: i64,
        opt_out: bool,
    ) -> impl std::future::Future<Output = Result<(), PortError>> + Send;

    /// Operator-configured keyword → auto-reply rules consulted after the
    /// built-in `STOP`/`INFO` keywords (SPEC_FULL.md §2, C4a).
    fn list_reply_rules(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ReplyRule>, PortError>> + Send;

    /// Append a received inbound message to the inbox, independent of any
    /// keyword handling applied to it.
    fn record_inbound(
        &self,
        record: &InboundRecord,
    ) -> impl std::future::Future<Output = Result<(), PortError>> + Send;

    /// The set of devices eligible to send on this run.
    fn active_devices(&self) -> impl std::future::Future<Output = Result<Vec<Device>, PortError>> + Send;

    /// Resolve a contact list's membership, honoring each contact's
    /// opt-out flag.
    fn list_contacts(
        &self,
        list: &ContactList,
    ) -> impl std::future::Future<Output = Result<Vec<Contact>, PortError>> + Send;

    /// Record a new send attempt and return its assigned id.
    fn record_attempt(
        &self,
        attempt: &Attempt,
    ) -> impl std::future::Future<Output = Result<i64, PortError>> + Send;

    /// Update an attempt's status once it is sent, delivered, or failed.
    fn update_attempt_status(
        &self,
        attempt_id: i64,
        status: AttemptStatus,
        error_code: Option<String>,
    ) -> impl std::future::Future<Output = Result<(), PortError>> + Send;

    /// Find the attempt whose modem-assigned reference matches a status
    /// report's (already-normalized) reference, if still open.
    fn find_attempt_by_reference(
        &self,
        reference: &str,
    ) -> impl std::future::Future<Output = Result<Option<Attempt>, PortError>> + Send;
}

/// Where the gateway reports things it observed: a delivered/failed
/// attempt, or a freshly received inbound message. Webhook posting is the
/// implementor's concern; this trait only describes the payloads.
pub trait NotificationPort: Send + Sync {
    fn notify_delivery(
        &self,
        attempt: &Attempt,
    ) -> impl std::future::Future<Output = Result<(), PortError>> + Send;

    fn notify_inbound(
        &self,
        record: &InboundRecord,
    ) -> impl std::future::Future<Output = Result<(), PortError>> + Send;
}
