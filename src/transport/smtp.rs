use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use crate::error::Error;

use super::{DeliveryId, Envelope, MailTransport, TransportError};

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when set, STARTTLS otherwise.
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

/// SMTP relay connection, built once and shared by every send.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<SmtpTransport, Error> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|err| Error::InvalidConfig(format!("smtp relay {}: {}", config.host, err)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(SmtpTransport {
            transport,
            host: config.host.clone(),
        })
    }
}

fn build_message(envelope: &Envelope, message_id: String) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(envelope.from.mailbox()?)
        .subject(envelope.subject.as_str())
        .message_id(Some(message_id))
        .header(ContentType::TEXT_HTML);

    for to in &envelope.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &envelope.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &envelope.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    builder
        .body(envelope.html.clone())
        .map_err(|err| TransportError::InvalidMessage(err.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|_| TransportError::InvalidAddress(address.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    #[tracing::instrument(skip(self), fields(host = %self.host))]
    async fn verify_connectivity(&self) -> Result<(), TransportError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransportError::Unavailable(format!(
                "{} did not accept the connection",
                self.host
            ))),
            Err(err) => Err(TransportError::Unavailable(err.to_string())),
        }
    }

    #[tracing::instrument(skip(self, envelope), fields(to = ?envelope.to))]
    async fn send(&self, envelope: &Envelope) -> Result<DeliveryId, TransportError> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.host);
        let message = build_message(envelope, message_id.clone())?;

        self.transport
            .send(message)
            .await
            .map_err(|err| TransportError::Rejected(err.to_string()))?;

        Ok(message_id)
    }
}
