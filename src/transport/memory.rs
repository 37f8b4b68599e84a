use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DeliveryId, Envelope, MailTransport, TransportError};

/// Transport that keeps every accepted envelope in memory. Used when running
/// without an SMTP server and as the transport in tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: Mutex<Vec<Envelope>>,
    attempts: AtomicU64,
    rejected: HashSet<String>,
    unavailable: bool,
}

impl MemoryTransport {
    pub fn new() -> MemoryTransport {
        MemoryTransport::default()
    }

    /// Rejects any envelope addressed to one of `addresses`.
    pub fn rejecting<I, S>(addresses: I) -> MemoryTransport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MemoryTransport {
            rejected: addresses.into_iter().map(Into::into).collect(),
            ..MemoryTransport::default()
        }
    }

    /// Fails connectivity checks and every send.
    pub fn unavailable() -> MemoryTransport {
        MemoryTransport {
            unavailable: true,
            ..MemoryTransport::default()
        }
    }

    pub fn outbox(&self) -> Vec<Envelope> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Number of `send` calls, accepted or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn verify_connectivity(&self) -> Result<(), TransportError> {
        if self.unavailable {
            return Err(TransportError::Unavailable("memory transport is offline".into()));
        }

        Ok(())
    }

    async fn send(&self, envelope: &Envelope) -> Result<DeliveryId, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.unavailable {
            return Err(TransportError::Unavailable("memory transport is offline".into()));
        }

        let addresses = envelope.to.iter().chain(&envelope.cc).chain(&envelope.bcc);
        if let Some(address) = addresses.into_iter().find(|a| self.rejected.contains(*a)) {
            return Err(TransportError::Rejected(format!(
                "550 mailbox unavailable: {}",
                address
            )));
        }

        self.outbox
            .lock()
            .map_err(|_| TransportError::Unavailable("outbox lock poisoned".into()))?
            .push(envelope.clone());

        Ok(format!("<memory-{}@localhost>", attempt))
    }
}
