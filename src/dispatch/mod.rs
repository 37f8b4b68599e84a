//! Drives a campaign through its send loop.
//!
//! Recipients are sent to one at a time in list order. Every recipient that
//! is still pending gets exactly one attempt per run, and a failure is
//! recorded on that recipient without stopping the batch. Progress is
//! checkpointed to the store every `checkpoint_interval` recipients and after
//! the last one, so a crashed run loses at most the recipients processed since
//! the previous checkpoint; those are simply still pending on the next run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::campaign::{Campaign, CampaignId, CampaignStatus, Delivery, DispatchResult};
use crate::database::Database;
use crate::error::Error;
use crate::transport::{is_valid_address, Envelope, MailTransport, Sender};

pub mod personalize;

pub use personalize::{personalize, personalize_with_fallback, DEFAULT_FALLBACK_NAME};

pub const INVALID_ADDRESS_ERROR: &str = "Invalid email address";

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub sender: Sender,
    /// Recipients processed between two checkpoints. Never zero.
    pub checkpoint_interval: usize,
    /// Pause between two consecutive transport calls.
    pub send_delay: Duration,
    pub fallback_name: String,
    pub verify_transport: bool,
}

impl DispatchSettings {
    pub fn new(sender: Sender) -> DispatchSettings {
        DispatchSettings {
            sender,
            checkpoint_interval: 5,
            send_delay: Duration::from_millis(100),
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
            verify_transport: true,
        }
    }
}

#[derive(Clone)]
pub struct DispatchEngine {
    db: Arc<dyn Database>,
    transport: Arc<dyn MailTransport>,
    settings: DispatchSettings,
    running: Arc<Mutex<HashSet<CampaignId>>>,
}

/// Marks a campaign as being dispatched for as long as it is alive.
struct RunGuard {
    running: Arc<Mutex<HashSet<CampaignId>>>,
    campaign_id: CampaignId,
}

impl RunGuard {
    fn claim(
        running: &Arc<Mutex<HashSet<CampaignId>>>,
        campaign_id: CampaignId,
    ) -> Result<RunGuard, Error> {
        let mut set = running
            .lock()
            .map_err(|_| Error::ExistentialState("dispatch registry lock poisoned".into()))?;
        if !set.insert(campaign_id) {
            return Err(Error::DispatchInProgress { campaign_id });
        }

        Ok(RunGuard {
            running: Arc::clone(running),
            campaign_id,
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.running.lock() {
            set.remove(&self.campaign_id);
        }
    }
}

impl DispatchEngine {
    pub fn new(
        db: Arc<dyn Database>,
        transport: Arc<dyn MailTransport>,
        mut settings: DispatchSettings,
    ) -> DispatchEngine {
        settings.checkpoint_interval = settings.checkpoint_interval.max(1);

        DispatchEngine {
            db,
            transport,
            settings,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn transport(&self) -> &dyn MailTransport {
        &*self.transport
    }

    pub fn sender(&self) -> &Sender {
        &self.settings.sender
    }

    /// Runs the dispatch in the background. The outcome is only logged; callers
    /// follow progress through the store.
    pub fn spawn(&self, campaign_id: CampaignId) -> JoinHandle<()> {
        let engine = self.clone();
        let span = tracing::info_span!("dispatch", %campaign_id);

        tokio::spawn(
            async move {
                match engine.dispatch(campaign_id).await {
                    Ok(result) => info!(
                        status = ?result.status,
                        sent = result.sent_count,
                        failed = result.failed_count,
                        total = result.total_recipients,
                        "sending completed"
                    ),
                    Err(err) => error!(error = %err, "sending aborted"),
                }
            }
            .instrument(span),
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, campaign_id: CampaignId) -> Result<DispatchResult, Error> {
        let _guard = RunGuard::claim(&self.running, campaign_id)?;

        self.settings
            .sender
            .mailbox()
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;

        let mut campaign = self
            .db
            .campaigns()
            .fetch_campaign_by_id(campaign_id)
            .await?
            .ok_or(Error::CampaignNotFound { campaign_id })?;

        if campaign.status.is_terminal() && !campaign.has_pending() {
            debug!(status = ?campaign.status, "nothing left to send");
            return Ok(campaign.result());
        }

        // a reopened campaign drops the completion time of its previous run
        campaign.status = CampaignStatus::Sending;
        campaign.completed_at = None;
        self.db.campaigns().mark_campaign_sending(campaign_id).await?;

        if self.settings.verify_transport {
            if let Err(err) = self.transport.verify_connectivity().await {
                warn!(error = %err, "mail transport unavailable, failing campaign");
                campaign.status = CampaignStatus::Failed;
                campaign.completed_at = Some(Utc::now());
                self.db.campaigns().finish_campaign(&campaign).await?;

                return Err(Error::TransportUnavailable {
                    reason: err.to_string(),
                });
            }
        }

        self.send_pending(&mut campaign).await?;

        campaign.status = campaign.final_status();
        campaign.completed_at = Some(Utc::now());
        self.db.campaigns().finish_campaign(&campaign).await?;

        Ok(campaign.result())
    }

    async fn send_pending(&self, campaign: &mut Campaign) -> Result<(), Error> {
        let mut unsaved = 0;
        let mut transport_used = false;

        for index in 0..campaign.recipients.len() {
            let recipient = &campaign.recipients[index];
            if !recipient.is_pending() {
                continue;
            }

            let delivery = if !is_valid_address(&recipient.email) {
                Delivery::Failed {
                    error: INVALID_ADDRESS_ERROR.to_string(),
                }
            } else {
                if transport_used && !self.settings.send_delay.is_zero() {
                    tokio::time::sleep(self.settings.send_delay).await;
                }
                transport_used = true;

                let envelope = Envelope::single(
                    self.settings.sender.clone(),
                    recipient.email.clone(),
                    campaign.subject.clone(),
                    personalize_with_fallback(
                        &campaign.content,
                        &recipient.name,
                        &self.settings.fallback_name,
                    ),
                );

                match self.transport.send(&envelope).await {
                    Ok(delivery_id) => {
                        debug!(email = %recipient.email, %delivery_id, "sent");
                        Delivery::Sent { at: Utc::now() }
                    }
                    Err(err) => {
                        warn!(email = %recipient.email, error = %err, "send failed");
                        Delivery::Failed {
                            error: err.to_string(),
                        }
                    }
                }
            };

            campaign.resolve(index, delivery);
            unsaved += 1;

            if unsaved == self.settings.checkpoint_interval {
                self.db.campaigns().checkpoint_campaign(campaign).await?;
                unsaved = 0;
            }
        }

        if unsaved > 0 {
            self.db.campaigns().checkpoint_campaign(campaign).await?;
        }

        Ok(())
    }
}
