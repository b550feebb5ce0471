//! Campaign dispatcher (C6): round-robins active devices for one
//! campaign run while enforcing a quiet-hour window (checked before
//! every send), a per-device rate limit, recipient dedup, and
//! opt-out filtering (left to [`PersistencePort::list_contacts`]);
//! records an Attempt per send and keeps going past individual
//! failures. One run processes its recipients strictly sequentially —
//! concurrency across campaigns and the inbound path is the caller's
//! business, not this function's.
use std::collections::{HashMap, HashSet};
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{sleep, Duration as TokioDuration, Instant};
use tracing::{info, instrument, warn};

use crate::errors::{GatewayError, GatewayResult};
use crate::model::{Attempt, AttemptStatus, Campaign, Contact, ContactList, SendWindow};
use crate::pdu;
use crate::ports::{NotificationPort, PersistencePort};
use crate::session::ModemSession;

/// Tally of one campaign run, returned to whatever scheduled it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Run `campaign` once against `list`, sending through whichever of
/// `sessions` corresponds to each round-robin-selected active device.
/// `sessions` is keyed by device id; a device the store reports active
/// but with no live entry here is skipped with a warning rather than
/// aborting the whole run (the device is presumably mid-reconnect).
#[instrument(skip_all, fields(campaign_id = campaign.id, campaign = %campaign.name))]
pub async fn run_once<P, N>(
    campaign: &Campaign,
    list: &ContactList,
    sessions: &HashMap<i64, ModemSession>,
    store: &P,
    notifier: &N,
) -> GatewayResult<DispatchOutcome>
where
    P: PersistencePort,
    N: NotificationPort,
{
    let devices = store
        .active_devices()
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to list active devices");
            GatewayError::NoActiveDevices
        })?;
    if devices.is_empty() {
        return Err(GatewayError::NoActiveDevices);
    }

    let contacts = store.list_contacts(list).await.map_err(|e| {
        warn!(error = %e, "failed to resolve campaign list membership");
        GatewayError::NoActiveDevices
    })?;
    let recipients = dedup_by_msisdn(contacts);
    info!(recipients = recipients.len(), devices = devices.len(), "starting campaign run");

    let mut last_sent: HashMap<i64, Instant> = HashMap::new();
    let mut device_cycle = devices.iter().cycle();
    let mut outcome = DispatchOutcome::default();

    for contact in recipients {
        if let Some(window) = campaign.window {
            wait_for_window(window).await;
        }

        // `devices` is non-empty, so `.cycle()` never runs dry.
        let device = device_cycle.next().expect("device cycle is non-empty");

        wait_for_rate_limit(&mut last_sent, device.id, campaign.rate_limit).await;

        let Some(session) = sessions.get(&device.id) else {
            warn!(device_id = device.id, "no live session for active device, skipping recipient");
            continue;
        };

        outcome.attempted += 1;
        let attempt = send_one(campaign, &contact, device.id, session).await;
        match attempt.status {
            AttemptStatus::Sent => outcome.sent += 1,
            AttemptStatus::Failed => outcome.failed += 1,
            _ => {}
        }
        if let Err(e) = store.record_attempt(&attempt).await {
            warn!(error = %e, "failed to record attempt");
        }
        last_sent.insert(device.id, Instant::now());
    }

    Ok(outcome)
}

async fn send_one(campaign: &Campaign, contact: &Contact, device_id: i64, session: &ModemSession) -> Attempt {
    let now = Utc::now();
    let text = campaign.template.clone();
    match session.send_sms(contact.msisdn.as_str(), &text).await {
        Ok(refs) => {
            let reference = refs
                .first()
                .map(|r| pdu::normalize_reference(&format!("{r:02X}")));
            Attempt {
                id: None,
                campaign_id: Some(campaign.id),
                contact_id: contact.id,
                device_id,
                text,
                reference,
                status: AttemptStatus::Sent,
                error_code: None,
                created_at: now,
                updated_at: now,
            }
        }
        Err(e) => {
            warn!(device_id, contact = %contact.msisdn, error = %e, "send failed, continuing with next recipient");
            // §4.6: a failed attempt's `error_code` is the modem line for a
            // rejected send; any other fault (timeout, session closed) falls
            // back to its own message.
            let error_code = match &e {
                GatewayError::ModemRejected { line } => line.clone(),
                other => other.to_string(),
            };
            Attempt {
                id: None,
                campaign_id: Some(campaign.id),
                contact_id: contact.id,
                device_id,
                text,
                reference: None,
                status: AttemptStatus::Failed,
                error_code: Some(error_code),
                created_at: now,
                updated_at: now,
            }
        }
    }
}

/// First occurrence of each normalized MSISDN wins; later duplicates in
/// `contacts` are dropped.
fn dedup_by_msisdn(contacts: Vec<Contact>) -> Vec<Contact> {
    let mut seen = HashSet::new();
    contacts.into_iter().filter(|c| seen.insert(c.msisdn.clone())).collect()
}

/// Sleep, if necessary, until `last_sent[device_id] + 1/rate_limit` has
/// elapsed. A device with no prior send in this run sends immediately.
async fn wait_for_rate_limit(last_sent: &mut HashMap<i64, Instant>, device_id: i64, rate_limit: u32) {
    let Some(&last) = last_sent.get(&device_id) else {
        return;
    };
    let min_gap = TokioDuration::from_secs_f64(1.0 / rate_limit.max(1) as f64);
    let elapsed = last.elapsed();
    if elapsed < min_gap {
        sleep(min_gap - elapsed).await;
    }
}

/// Sleep, if necessary, until the next moment `window` covers. Checked
/// immediately before every send, not only once at the start of a run.
async fn wait_for_window(window: SendWindow) {
    let now_utc = Utc::now();
    let now = now_utc.time();
    if now >= window.start && now <= window.end {
        return;
    }
    let target_date = if now > window.end {
        now_utc.date_naive() + ChronoDuration::days(1)
    } else {
        now_utc.date_naive()
    };
    let target = target_date.and_time(window.start);
    let target_utc = chrono::DateTime::<Utc>::from_naive_utc_and_offset(target, Utc);
    let remaining = (target_utc - now_utc).to_std().unwrap_or(StdDuration::ZERO);
    sleep(remaining).await;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let c = |id: i64, msisdn: &str| Contact {
            id,
            msisdn: crate::model::Msisdn::parse(msisdn).unwrap(),
            name: None,
            opt_out: false,
        };
        let contacts = vec![c(1, "+15551234567"), c(2, "+15551234567"), c(3, "+15557654321")];
        let deduped = dedup_by_msisdn(contacts);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, 1);
        assert_eq!(deduped[1].id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_full_interval_between_sends_to_same_device() {
        let mut last_sent = HashMap::new();
        last_sent.insert(1i64, Instant::now());
        let start = Instant::now();
        wait_for_rate_limit(&mut last_sent, 1, 2).await; // 0.5s minimum gap
        assert!(start.elapsed() >= TokioDuration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_does_not_wait_for_a_device_with_no_prior_send() {
        let mut last_sent = HashMap::new();
        let start = Instant::now();
        wait_for_rate_limit(&mut last_sent, 1, 1).await;
        assert_eq!(start.elapsed(), TokioDuration::ZERO);
    }
}
