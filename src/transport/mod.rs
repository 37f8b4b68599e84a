use std::fmt::Display;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::Address;

pub mod memory;
pub mod smtp;

pub use memory::MemoryTransport;
pub use smtp::{SmtpConfig, SmtpTransport};

/// Identifier the transport assigned to an accepted message.
pub type DeliveryId = String;

/// A single outbound message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub from: Sender,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
}

impl Envelope {
    pub fn single(from: Sender, to: String, subject: String, html: String) -> Envelope {
        Envelope {
            from,
            to: vec![to],
            subject,
            html,
            ..Envelope::default()
        }
    }
}

/// The identity outgoing mail is sent as. The display name and the address
/// only meet in [`Sender::mailbox`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub name: Option<String>,
}

impl Sender {
    pub fn mailbox(&self) -> Result<Mailbox, TransportError> {
        let address: Address = self
            .email
            .trim()
            .parse()
            .map_err(|_| TransportError::InvalidSender(self.email.clone()))?;
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Mailbox::new(name, address))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    InvalidAddress(String),
    InvalidSender(String),
    InvalidMessage(String),
    Rejected(String),
    Unavailable(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            TransportError::InvalidAddress(address) => write!(f, "Invalid address: {}", address),
            TransportError::InvalidSender(address) => {
                write!(f, "Invalid sender address: {}", address)
            }
            TransportError::InvalidMessage(reason) => write!(f, "Invalid message: {}", reason),
            TransportError::Rejected(reason) => write!(f, "Delivery rejected: {}", reason),
            TransportError::Unavailable(reason) => {
                write!(f, "Mail server unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn verify_connectivity(&self) -> Result<(), TransportError>;

    async fn send(&self, envelope: &Envelope) -> Result<DeliveryId, TransportError>;
}

/// Whether `email` parses as a deliverable address.
pub fn is_valid_address(email: &str) -> bool {
    !email.is_empty() && email.parse::<Address>().is_ok()
}
