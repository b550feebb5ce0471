//! Crate-wide configuration (§6): the three knobs the core needs from
//! whatever binary or service embeds it. Kept as a plain struct rather
//! than reaching for a config-file crate — the teacher has no config
//! layer to draw from, and three fields don't justify importing one.
use std::str::FromStr;

use crate::errors::GatewayError;

/// `DEFAULT_REGION`, `INFO_REPLY_TEMPLATE`, and `STATUS_NOTIFY_URL` from
/// §6, built directly by the embedding binary (HTTP façade, CLI, etc.).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// ISO-3166 alpha-2 region used as the national-dialing fallback when
    /// normalizing an inbound MSISDN that wasn't already in E.164 form.
    pub default_region: String,
    /// Auto-reply body sent back for the `INFO` keyword.
    pub info_reply_template: String,
    /// Where the external notifier posts delivery/inbound webhooks;
    /// consulted only by that external collaborator, never by the core.
    pub status_notify_url: Option<String>,
}

impl GatewayConfig {
    pub fn new(default_region: impl Into<String>, info_reply_template: impl Into<String>) -> Self {
        GatewayConfig {
            default_region: default_region.into(),
            info_reply_template: info_reply_template.into(),
            status_notify_url: None,
        }
    }

    pub fn with_status_notify_url(mut self, url: impl Into<String>) -> Self {
        self.status_notify_url = Some(url.into());
        self
    }

    /// Resolve `default_region` to a `phonenumber` country id, failing as
    /// [`GatewayError::InvalidMsisdn`] (a misconfigured region makes every
    /// inbound number on this device unparsable, same observable effect).
    pub(crate) fn region(&self) -> Result<phonenumber::country::Id, GatewayError> {
        phonenumber::country::Id::from_str(&self.default_region)
            .map_err(|_| GatewayError::InvalidMsisdn(format!("unknown region {}", self.default_region)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn region_resolves_known_code() {
        let cfg = GatewayConfig::new("US", "Reply STOP to opt out");
        assert!(cfg.region().is_ok());
    }

    #[test]
    fn region_rejects_unknown_code() {
        let cfg = GatewayConfig::new("ZZ", "Reply STOP to opt out");
        assert!(cfg.region().is_err());
    }
}
