//! WhatsApp delivery of verification codes via the UltraMsg chat API.
//!
//! [`UltraMsgSender`] posts a plain-text message to the configured instance;
//! [`ConsoleSender`] logs the code instead, for development without an
//! UltraMsg account.

use anyhow::{bail, Context};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use voltquote_core::config::WhatsAppConfig;
use voltquote_core::verify::{CodeSender, CODE_TTL_MINUTES};

fn code_message(code: &str) -> String {
    format!("Je verificatiecode is {code}. Deze code verloopt over {CODE_TTL_MINUTES} minuten.")
}

/// Sends codes through the UltraMsg `messages/chat` endpoint. The token
/// travels as a query parameter, which is how UltraMsg authenticates.
pub struct UltraMsgSender {
    http: reqwest::Client,
    base_url: String,
    instance_id: String,
    token: SecretString,
}

impl UltraMsgSender {
    pub fn new(base_url: impl Into<String>, instance_id: impl Into<String>, token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            instance_id: instance_id.into(),
            token,
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> anyhow::Result<Self> {
        let instance_id =
            config.instance_id.clone().context("whatsapp.instance_id is required for UltraMsg")?;
        let token = config.token.clone().context("whatsapp.token is required for UltraMsg")?;
        Ok(Self::new(config.base_url.clone(), instance_id, token))
    }
}

#[async_trait::async_trait]
impl CodeSender for UltraMsgSender {
    async fn send_code(&self, phone_e164: &str, code: &str) -> anyhow::Result<()> {
        let url = format!("{}/{}/messages/chat", self.base_url, self.instance_id);
        let response = self
            .http
            .post(&url)
            .query(&[("token", self.token.expose_secret())])
            .form(&[("to", phone_e164), ("body", &code_message(code))])
            .send()
            .await
            .context("ultramsg send request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ultramsg send failed: {status} {body}");
        }

        debug!(event_name = "whatsapp.code_sent", to = phone_e164, "verification code sent");
        Ok(())
    }
}

/// Development sender: the code never leaves the process, it is only logged.
pub struct ConsoleSender;

#[async_trait::async_trait]
impl CodeSender for ConsoleSender {
    async fn send_code(&self, phone_e164: &str, code: &str) -> anyhow::Result<()> {
        info!(event_name = "whatsapp.code_logged", to = phone_e164, code, "dev mode, code not sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use voltquote_core::verify::CodeSender;

    use super::{code_message, ConsoleSender};

    #[test]
    fn message_names_the_code_and_the_ttl() {
        let message = code_message("123456");
        assert_eq!(message, "Je verificatiecode is 123456. Deze code verloopt over 10 minuten.");
    }

    #[tokio::test]
    async fn console_sender_always_succeeds() {
        ConsoleSender.send_code("+31612345678", "123456").await.expect("console send");
    }
}
