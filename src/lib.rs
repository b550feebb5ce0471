//! Core of a multi-modem SMS gateway: a bit-exact SMS-SUBMIT /
//! SMS-DELIVER / SMS-STATUS-REPORT PDU codec ([`pdu`]), a per-port AT/PDU
//! modem session driver ([`session`]), and a campaign dispatcher
//! ([`dispatcher`]) that round-robins devices under a rate limit, quiet
//! hours, and recipient dedup. The HTTP façade, auth, relational store,
//! CSV ingestion, and outbound webhook posting this gateway needs in
//! production are all external collaborators reached through the
//! [`ports`] traits — this crate has no process-wide state and no
//! database of its own, the way `huawei-modem` (the library this crate
//! grew out of) ships as a pure driver with illustrative binaries under
//! `demos/` rather than a service of its own.
pub mod at;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error_codes;
pub mod errors;
pub mod events;
pub mod inbound;
pub mod model;
pub mod parse;
pub mod pdu;
pub mod ports;
pub mod reconciler;
pub mod session;
pub mod transport;

pub use config::GatewayConfig;
pub use errors::{GatewayError, GatewayResult};
pub use session::{ModemSession, SessionEvent};
