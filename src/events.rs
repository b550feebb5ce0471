//! Events the modem session layer emits to its caller: an inbound message
//! or a delivery report, each carrying enough of the decoded PDU for the
//! inbound handler and reconciler to act without re-parsing it.
use crate::pdu::{DeliveryStatus, udh::ConcatHeader};

/// One received SMS-DELIVER, already reassembled if it was the final
/// segment of a concatenated message (see [`crate::session`]); a
/// non-final segment produces no event at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub originating_address: String,
    pub text: String,
    pub device_id: i64,
}

/// One received SMS-STATUS-REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReportEvent {
    pub reference: String,
    pub status: DeliveryStatus,
    pub device_id: i64,
}

/// Internal bookkeeping for reassembling a concatenated inbound message:
/// one entry per (reference, total) pair seen, holding whatever segments
/// have arrived so far.
#[derive(Debug, Default)]
pub(crate) struct Reassembly {
    pending: std::collections::HashMap<(u16, u8), Vec<Option<String>>>,
}

impl Reassembly {
    /// Feed one segment in. Returns the joined text once every segment of
    /// its message has arrived; otherwise buffers it and returns `None`.
    pub fn feed(&mut self, concat: ConcatHeader, text: String) -> Option<String> {
        let key = (concat.reference, concat.total);
        let slots = self
            .pending
            .entry(key)
            .or_insert_with(|| vec![None; concat.total as usize]);
        if let Some(slot) = slots.get_mut((concat.index as usize).saturating_sub(1)) {
            *slot = Some(text);
        }
        if slots.iter().all(Option::is_some) {
            let joined = self
                .pending
                .remove(&key)
                .unwrap()
                .into_iter()
                .map(|s| s.unwrap_or_default())
                .collect();
            Some(joined)
        } else {
            None
        }
    }
}
