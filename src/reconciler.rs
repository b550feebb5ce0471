//! Delivery-report reconciliation (C5): maps a `DeliveryReportEvent`'s
//! reference back to the Attempt it belongs to and updates its status.
//! The reference comparison itself lives in [`crate::pdu::normalize_reference`]
//! (leading zeros stripped, never collapsed to empty) — both the
//! attempt's stored reference and the report's are normalized the same
//! way before either side calls the persistence port, so the port's
//! `find_attempt_by_reference` only ever needs exact string matching.
use tracing::warn;

use crate::events::DeliveryReportEvent;
use crate::model::AttemptStatus;
use crate::pdu::DeliveryStatus;
use crate::ports::{NotificationPort, PersistencePort};

/// Apply one delivery report. A report with no matching attempt, or any
/// persistence/notification fault, is logged and dropped — the reader
/// loop feeding this function must never stop over it.
pub async fn reconcile<P, N>(event: DeliveryReportEvent, store: &P, notifier: &N)
where
    P: PersistencePort,
    N: NotificationPort,
{
    let attempt = match store.find_attempt_by_reference(&event.reference).await {
        Ok(Some(attempt)) => attempt,
        Ok(None) => {
            warn!(reference = %event.reference, "no attempt matches delivery report, dropping");
            return;
        }
        Err(e) => {
            warn!(error = %e, "failed to look up attempt by reference");
            return;
        }
    };

    let (status, error_code) = match event.status {
        DeliveryStatus::Delivered => (AttemptStatus::Delivered, None),
        DeliveryStatus::Failed(code) => (AttemptStatus::Failed, Some(code)),
        DeliveryStatus::Unknown(code) => (AttemptStatus::Unknown, Some(format!("{code:02X}"))),
    };

    let Some(attempt_id) = attempt.id else {
        warn!(reference = %event.reference, "matched attempt has no id, cannot update");
        return;
    };

    if let Err(e) = store
        .update_attempt_status(attempt_id, status, error_code.clone())
        .await
    {
        warn!(error = %e, "failed to persist attempt status update");
        return;
    }

    let mut updated = attempt;
    updated.status = status;
    updated.error_code = error_code;
    if let Err(e) = notifier.notify_delivery(&updated).await {
        warn!(error = %e, "delivery status notification failed");
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{Attempt, Contact, ContactList, Device, InboundRecord, Msisdn, ReplyRule};
    use crate::errors::PortError;

    #[derive(Default)]
    struct FakeStore {
        attempts: Mutex<Vec<Attempt>>,
    }

    impl PersistencePort for FakeStore {
        async fn find_contact(&self, _msisdn: &Msisdn) -> Result<Option<Contact>, PortError> {
            Ok(None)
        }
        async fn upsert_contact(&self, msisdn: &Msisdn) -> Result<Contact, PortError> {
            Ok(Contact { id: 1, msisdn: msisdn.clone(), name: None, opt_out: false })
        }
        async fn set_opt_out(&self, _contact_id: i64, _opt_out: bool) -> Result<(), PortError> {
            Ok(())
        }
        async fn list_reply_rules(&self) -> Result<Vec<ReplyRule>, PortError> {
            Ok(vec![])
        }
        async fn record_inbound(&self, _record: &InboundRecord) -> Result<(), PortError> {
            Ok(())
        }
        async fn active_devices(&self) -> Result<Vec<Device>, PortError> {
            Ok(vec![])
        }
        async fn list_contacts(&self, _list: &ContactList) -> Result<Vec<Contact>, PortError> {
            Ok(vec![])
        }
        async fn record_attempt(&self, attempt: &Attempt) -> Result<i64, PortError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(attempt.clone());
            Ok(attempts.len() as i64)
        }
        async fn update_attempt_status(
            &self,
            attempt_id: i64,
            status: AttemptStatus,
            error_code: Option<String>,
        ) -> Result<(), PortError> {
            let mut attempts = self.attempts.lock().unwrap();
            if let Some(a) = attempts.iter_mut().find(|a| a.id == Some(attempt_id)) {
                a.status = status;
                a.error_code = error_code;
            }
            Ok(())
        }
        async fn find_attempt_by_reference(&self, reference: &str) -> Result<Option<Attempt>, PortError> {
            let attempts = self.attempts.lock().unwrap();
            Ok(attempts
                .iter()
                .rev()
                .find(|a| a.reference.as_deref() == Some(reference))
                .cloned())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        delivered: Mutex<Vec<Attempt>>,
    }

    impl NotificationPort for FakeNotifier {
        async fn notify_delivery(&self, attempt: &Attempt) -> Result<(), PortError> {
            self.delivered.lock().unwrap().push(attempt.clone());
            Ok(())
        }
        async fn notify_inbound(&self, _record: &InboundRecord) -> Result<(), PortError> {
            Ok(())
        }
    }

    fn attempt_with_ref(id: i64, reference: &str) -> Attempt {
        let now = chrono::Utc::now();
        Attempt {
            id: Some(id),
            campaign_id: None,
            contact_id: 1,
            device_id: 1,
            text: "hi".into(),
            reference: Some(reference.to_string()),
            status: AttemptStatus::Sent,
            error_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn delivered_status_flips_matching_attempt() {
        let store = FakeStore::default();
        store.record_attempt(&attempt_with_ref(0, "2A")).await.unwrap();
        let notifier = FakeNotifier::default();

        reconcile(
            DeliveryReportEvent { reference: "2A".into(), status: DeliveryStatus::Delivered, device_id: 1 },
            &store,
            &notifier,
        )
        .await;

        let attempts = store.attempts.lock().unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::Delivered);
        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_status_records_error_code() {
        let store = FakeStore::default();
        store.record_attempt(&attempt_with_ref(0, "2B")).await.unwrap();
        let notifier = FakeNotifier::default();

        reconcile(
            DeliveryReportEvent { reference: "2B".into(), status: DeliveryStatus::Failed("41".into()), device_id: 1 },
            &store,
            &notifier,
        )
        .await;

        let attempts = store.attempts.lock().unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert_eq!(attempts[0].error_code.as_deref(), Some("41"));
    }

    #[tokio::test]
    async fn unmatched_reference_is_dropped_without_panicking() {
        let store = FakeStore::default();
        let notifier = FakeNotifier::default();
        reconcile(
            DeliveryReportEvent { reference: "FF".into(), status: DeliveryStatus::Delivered, device_id: 1 },
            &store,
            &notifier,
        )
        .await;
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }
}
