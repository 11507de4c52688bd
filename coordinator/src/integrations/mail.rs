//! Outgoing mail over an SMTP relay.

use async_trait::async_trait;
use eyre::WrapErr as _;
use lettre::{
    AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret as _;

use super::Mailer;
use crate::config::SmtpConfig;

pub(crate) struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first mail is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address or relay settings are invalid.
    pub(crate) fn new(config: &SmtpConfig) -> eyre::Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .wrap_err("Invalid SMTP relay")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (&Some(ref username), &Some(ref password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_owned(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config
                .from
                .parse()
                .wrap_err(format!("Invalid sender address: {}", config.from))?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip(self, body), err(Debug))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> eyre::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .wrap_err(format!("Invalid recipient address: {to}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .wrap_err("Failed to build mail")?;
        self.transport
            .send(message)
            .await
            .wrap_err("SMTP delivery failed")?;
        Ok(())
    }
}
