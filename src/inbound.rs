//! Inbound message handling (C4): normalizes the originating address,
//! upserts the contact, records the message to the inbox regardless of
//! its content, and applies the fixed `STOP`/`INFO` keywords plus any
//! operator-configured reply rules (§2 C4a) on top.
use tracing::{instrument, warn};

use crate::config::GatewayConfig;
use crate::errors::GatewayError;
use crate::events::InboundEvent;
use crate::model::{InboundRecord, Msisdn};
use crate::ports::{NotificationPort, PersistencePort};
use crate::session::ModemSession;

const STOP_KEYWORD: &str = "stop";
const INFO_KEYWORD: &str = "info";

/// Validate and reformat a freshly-received originating address to E.164,
/// mirroring `original_source`'s `backend/utils.py::normalize_msisdn`
/// (parse against `default_region`, validate, reformat). Numbers already
/// in E.164 form normalize to themselves.
pub fn normalize_msisdn(raw: &str, config: &GatewayConfig) -> Result<Msisdn, GatewayError> {
    let region = config.region()?;
    let parsed = phonenumber::parse(Some(region), raw)
        .map_err(|_| GatewayError::InvalidMsisdn(raw.to_string()))?;
    if !phonenumber::is_valid(&parsed) {
        return Err(GatewayError::InvalidMsisdn(raw.to_string()));
    }
    let formatted = parsed.format().mode(phonenumber::Mode::E164).to_string();
    Msisdn::parse(formatted).map_err(|_| GatewayError::InvalidMsisdn(raw.to_string()))
}

/// Handle one `InboundEvent`: normalize, upsert the contact, record the
/// inbox entry, then apply keyword handling. Returns the normalization
/// error the caller sees when the address can't be parsed (§7
/// `InvalidMsisdn`); every other failure is logged and swallowed here,
/// since persistence/notification faults must not take down the reader
/// loop feeding this function.
#[instrument(skip_all, fields(device_id = event.device_id))]
pub async fn handle_inbound<P, N>(
    event: InboundEvent,
    session: &ModemSession,
    store: &P,
    notifier: &N,
    config: &GatewayConfig,
) -> Result<(), GatewayError>
where
    P: PersistencePort,
    N: NotificationPort,
{
    let msisdn = normalize_msisdn(&event.originating_address, config).map_err(|e| {
        warn!(address = %event.originating_address, error = %e, "dropping inbound with unparsable MSISDN");
        e
    })?;

    let contact = match store.upsert_contact(&msisdn).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to upsert contact for inbound message");
            return Ok(());
        }
    };

    let record = InboundRecord {
        msisdn: msisdn.clone(),
        text: event.text.clone(),
        device_id: event.device_id,
        received_at: chrono::Utc::now(),
    };
    if let Err(e) = store.record_inbound(&record).await {
        warn!(error = %e, "failed to append inbox record");
    }
    if let Err(e) = notifier.notify_inbound(&record).await {
        warn!(error = %e, "inbound notification failed");
    }

    let trimmed = event.text.trim();
    if trimmed.eq_ignore_ascii_case(STOP_KEYWORD) {
        if let Err(e) = store.set_opt_out(contact.id, true).await {
            warn!(error = %e, "failed to set opt-out flag");
        }
        return Ok(());
    }

    if contact.opt_out {
        // An opted-out contact gets no auto-replies at all, including INFO.
        return Ok(());
    }

    if trimmed.eq_ignore_ascii_case(INFO_KEYWORD) {
        send_reply(session, msisdn.as_str(), &config.info_reply_template).await;
        return Ok(());
    }

    match store.list_reply_rules().await {
        Ok(rules) => {
            if let Some(rule) = rules.iter().find(|r| trimmed.eq_ignore_ascii_case(&r.keyword)) {
                send_reply(session, msisdn.as_str(), &rule.response).await;
            }
        }
        Err(e) => warn!(error = %e, "failed to load reply rules"),
    }

    Ok(())
}

async fn send_reply(session: &ModemSession, to: &str, body: &str) {
    if let Err(e) = session.send_sms(to, body).await {
        warn!(to, error = %e, "auto-reply send failed");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_already_e164_number() {
        let config = GatewayConfig::new("US", "info template");
        let msisdn = normalize_msisdn("+15551234567", &config).unwrap();
        assert_eq!(msisdn.as_str(), "+15551234567");
    }

    #[test]
    fn normalizes_national_number_with_default_region() {
        let config = GatewayConfig::new("US", "info template");
        let msisdn = normalize_msisdn("(650) 253-0000", &config).unwrap();
        assert_eq!(msisdn.as_str(), "+16502530000");
    }

    #[test]
    fn rejects_unparsable_number() {
        let config = GatewayConfig::new("US", "info template");
        assert!(normalize_msisdn("not-a-number", &config).is_err());
    }
}
