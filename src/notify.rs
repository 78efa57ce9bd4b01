//! Notification side effects: transactional email and template messages.
//!
//! Delivery is always best-effort. The `spawn_*` helpers are the explicit
//! fire-and-forget boundary: a detached task that logs failures and can
//! never affect the primary verification or billing outcome.

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outbound notification sender.
pub struct Notifier {
    config: NotifyConfig,
    http: reqwest::Client,
    api_token: Option<String>,
}

impl Notifier {
    /// Build the notifier. The delivery token is read from
    /// `VERIDESK_NOTIFY_TOKEN`, never from configuration files.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("notify client: {e}")))?;
        Ok(Self {
            config,
            http,
            api_token: std::env::var("VERIDESK_NOTIFY_TOKEN").ok(),
        })
    }

    /// Whether delivery is enabled at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send a transactional email.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery endpoint rejects the request.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.config.enabled {
            debug!(to, subject, "notifications disabled, skipping email");
            return Ok(());
        }
        let payload = json!({
            "to": to,
            "from": self.config.from_address,
            "subject": subject,
            "body": body,
        });
        self.post(&self.config.email_endpoint, &payload).await
    }

    /// Send a template message to a phone contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery endpoint rejects the request.
    pub async fn send_message(&self, phone: &str, template: &str, params: &[String]) -> Result<()> {
        if !self.config.enabled {
            debug!(phone, template, "notifications disabled, skipping message");
            return Ok(());
        }
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "template",
            "template": {
                "name": template,
                "language": { "code": "en" },
                "components": [{
                    "type": "body",
                    "parameters": params.iter()
                        .map(|p| json!({ "type": "text", "text": p }))
                        .collect::<Vec<_>>(),
                }],
            },
        });
        self.post(&self.config.message_endpoint, &payload).await
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let mut request = self.http.post(url).json(payload);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Notification(format!(
                "delivery endpoint returned {}",
                response.status()
            )))
        }
    }

    /// Fire-and-forget low-balance alert to the tenant's contacts.
    pub fn spawn_low_balance_alert(
        self: &Arc<Self>,
        email: Option<String>,
        phone: Option<String>,
        balance: i64,
    ) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, dropping low-balance alert");
            return;
        };
        let notifier = Arc::clone(self);
        handle.spawn(async move {
            if let Some(email) = email {
                let body = format!(
                    "Your current balance is {balance}. Please recharge to ensure \
                     uninterrupted verifications."
                );
                if let Err(e) = notifier
                    .send_email(&email, "Action required: low wallet balance", &body)
                    .await
                {
                    error!("low-balance email failed: {e}");
                }
            }
            if let Some(phone) = phone {
                if let Err(e) = notifier
                    .send_message(&phone, "wallet_low_balance", &[balance.to_string()])
                    .await
                {
                    error!("low-balance message failed: {e}");
                }
            }
        });
    }

    /// Fire-and-forget rejection alert carrying the subject name and the
    /// failure reason.
    pub fn spawn_rejection_alert(
        self: &Arc<Self>,
        email: Option<String>,
        phone: Option<String>,
        subject_name: String,
        reason: String,
    ) {
        if email.is_none() && phone.is_none() {
            info!("no registered contact for rejection alert");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, dropping rejection alert");
            return;
        };
        let notifier = Arc::clone(self);
        handle.spawn(async move {
            if let Some(phone) = phone {
                if let Err(e) = notifier
                    .send_message(
                        &phone,
                        "verification_rejected",
                        &[subject_name.clone(), reason.clone()],
                    )
                    .await
                {
                    error!("rejection message failed: {e}");
                }
            }
            if let Some(email) = email {
                let subject = format!("Verification REJECTED: {subject_name}");
                let body = format!(
                    "Entity: {subject_name}\nReason: {reason}\n\
                     Log in to the dashboard to review the full audit record."
                );
                if let Err(e) = notifier.send_email(&email, &subject, &body).await {
                    error!("rejection email failed: {e}");
                }
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_swallows_sends() {
        let notifier = Notifier::new(NotifyConfig::default()).expect("notifier");
        assert!(!notifier.is_enabled());
        notifier
            .send_email("a@b.c", "subject", "body")
            .await
            .expect("email is a no-op");
        notifier
            .send_message("+100", "wallet_low_balance", &["2".to_string()])
            .await
            .expect("message is a no-op");
    }

    #[tokio::test]
    async fn spawned_alerts_never_fail_the_caller() {
        let notifier = Arc::new(Notifier::new(NotifyConfig::default()).expect("notifier"));
        notifier.spawn_low_balance_alert(Some("a@b.c".to_string()), None, 2);
        notifier.spawn_rejection_alert(None, None, "name".to_string(), "reason".to_string());
        // Nothing to assert beyond "did not panic"; delivery is detached.
        tokio::task::yield_now().await;
    }
}
