//! Typed representations of the `+CMS ERROR: <n>` codes a modem reports
//! for SMS-related AT command failures (3GPP TS 27.005 §3.2.5).
#![allow(missing_docs)]
use num_enum::TryFromPrimitive;
use thiserror::Error;

/// A CMS (SMS-related) error code. `CmsError::try_from(n)` maps a numeric
/// code to its variant; codes this table doesn't recognize surface as
/// [`crate::at::AtResultCode::CmsErrorUnknown`] instead.
#[derive(TryFromPrimitive, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(u32)]
pub enum CmsError {
    #[error("Unassigned (unallocated) number")]
    UnassignedNumber = 1,
    #[error("Operator determined barring")]
    OperatorDeterminedBarring = 8,
    #[error("Call barred")]
    CallBarred = 10,
    #[error("Short message transfer rejected")]
    TransferRejected = 21,
    #[error("Destination out of service")]
    DestinationOutOfService = 27,
    #[error("Unidentified subscriber")]
    UnidentifiedSubscriber = 28,
    #[error("Facility rejected")]
    FacilityRejected = 29,
    #[error("Unknown subscriber")]
    UnknownSubscriber = 30,
    #[error("Network out of order")]
    NetworkOutOfOrder = 38,
    #[error("Temporary failure")]
    TemporaryFailure = 41,
    #[error("Congestion")]
    Congestion = 42,
    #[error("Resources unavailable, unspecified")]
    ResourcesUnavailable = 47,
    #[error("Requested facility not subscribed")]
    NotSubscribed = 50,
    #[error("Requested facility not implemented")]
    NotImplemented = 69,
    #[error("Invalid short message transfer reference value")]
    InvalidReferenceValue = 81,
    #[error("Invalid message, unspecified")]
    InvalidMessage = 95,
    #[error("Invalid mandatory information")]
    InvalidMandatoryInformation = 96,
    #[error("Message type non-existent or not implemented")]
    NonexistentMessageType = 97,
    #[error("Message not compatible with short message protocol state")]
    IncompatibleMessage = 98,
    #[error("Information element non-existent or not implemented")]
    NonexistentInformationElement = 99,
    #[error("Protocol error, unspecified")]
    ProtocolError = 111,
    #[error("Internetworking, unspecified")]
    InternetworkingError = 127,
    #[error("ME failure")]
    MeFailure = 300,
    #[error("SMS service of ME reserved")]
    SmsServiceReserved = 301,
    #[error("Operation not allowed")]
    NotAllowed = 302,
    #[error("Operation not supported")]
    NotSupported = 303,
    #[error("Invalid PDU mode parameter")]
    InvalidPduModeParameter = 304,
    #[error("Invalid text mode parameter")]
    InvalidTextModeParameter = 305,
    #[error("(U)SIM not inserted")]
    SimNotInserted = 310,
    #[error("(U)SIM PIN required")]
    SimPinRequired = 311,
    #[error("PH-(U)SIM PIN required")]
    PhSimPinRequired = 312,
    #[error("(U)SIM failure")]
    SimFailure = 313,
    #[error("(U)SIM busy")]
    SimBusy = 314,
    #[error("(U)SIM wrong")]
    SimWrong = 315,
    #[error("(U)SIM PUK required")]
    SimPukRequired = 316,
    #[error("(U)SIM PIN2 required")]
    SimPin2Required = 317,
    #[error("(U)SIM PUK2 required")]
    SimPuk2Required = 318,
    #[error("Memory failure")]
    MemoryFailure = 320,
    #[error("Invalid memory index")]
    InvalidMemoryIndex = 321,
    #[error("Memory full")]
    MemoryFull = 322,
    #[error("SMSC address unknown")]
    SmscAddressUnknown = 330,
    #[error("No network service")]
    NoNetworkService = 331,
    #[error("Network timeout")]
    NetworkTimeout = 332,
    #[error("No `+CNMA` acknowledgement expected")]
    NoCnmaAcknowledgementExpected = 340,
    #[error("Unknown error")]
    UnknownError = 500,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn maps_known_code() {
        assert_eq!(CmsError::try_from(42), Ok(CmsError::Congestion));
    }

    #[test]
    fn rejects_unknown_code() {
        assert!(CmsError::try_from(9999).is_err());
    }
}
