use anyhow::{anyhow, Result};
use lettre::message::Mailbox;
use lettre::{Address, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

type AsyncSmtpTransport = lettre::AsyncSmtpTransport<Tokio1Executor>;

/// Outbound SMTP mail. The transport is optional: an unconfigured mailer
/// reports every send as failed instead of panicking, and callers log the
/// outcome either way. Delivery is attempted once; there is no retry.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport>,
    from: Option<Mailbox>,
    public_base_url: String,
}

impl Mailer {
    pub fn new(smtp: Option<&SmtpConfig>, public_base_url: String) -> Result<Self> {
        let (transport, from) = match smtp {
            Some(config) => {
                let transport = AsyncSmtpTransport::from_url(&config.url)?.build();
                let from = config
                    .from_address
                    .parse::<Mailbox>()
                    .map_err(|err| anyhow!("invalid SMTP_FROM_ADDRESS: {}", err))?;
                (Some(transport), Some(from))
            }
            None => (None, None),
        };

        Ok(Self {
            transport,
            from,
            public_base_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<()> {
        let link = format!("{}/confirm?token={}", self.public_base_url, token);
        let body = format!(
            "Hello {username},\n\n\
             Welcome! To confirm your account please open the following link:\n\
             {link}\n\n\
             Please do not reply to this email.\n"
        );
        self.send(to_email, username, "Please confirm your account", body)
            .await
    }

    pub async fn send_password_reset(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<()> {
        let link = format!("{}/reset-password?token={}", self.public_base_url, token);
        let body = format!(
            "Hello {username},\n\n\
             To reset your password please open the following link:\n\
             {link}\n\n\
             If you did not request this, you can ignore this email.\n"
        );
        self.send(to_email, username, "Reset your password", body)
            .await
    }

    async fn send(
        &self,
        to_email: &str,
        to_username: &str,
        subject: &str,
        body: String,
    ) -> Result<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow!("smtp transport not configured"))?;
        let from = self
            .from
            .clone()
            .ok_or_else(|| anyhow!("smtp transport not configured"))?;

        let to_address = to_email
            .parse::<Address>()
            .map_err(|err| anyhow!("invalid recipient address: {}", err))?;

        let message = Message::builder()
            .from(from)
            .to(Mailbox::new(Some(to_username.to_string()), to_address))
            .subject(subject)
            .body(body)?;

        transport.send(message).await?;
        Ok(())
    }
}
