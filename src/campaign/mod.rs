use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod intake;
pub mod manager;
pub use endpoints::*;

pub type CampaignId = TypedId<Campaign>;

/// One bulk-send job. The counters are kept as stored fields so that clients
/// and queries can read them, but they are only ever written by
/// [`Campaign::recount`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub subject: String,
    pub content: String,
    pub recipients: Vec<Recipient>,
    pub status: CampaignStatus,
    total_recipients: u32,
    sent_count: u32,
    failed_count: u32,
    pub created_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::optional_bson_datetime"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CMP"
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Completed,
    Partial,
    Failed,
}

impl CampaignStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Partial | CampaignStatus::Failed
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub status: RecipientStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::optional_bson_datetime"
    )]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl Recipient {
    pub fn pending(email: String, name: String) -> Recipient {
        Recipient {
            email,
            name,
            status: RecipientStatus::Pending,
            sent_at: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecipientStatus::Pending
    }
}

/// What happened to a single recipient during a dispatch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent { at: DateTime<Utc> },
    Failed { error: String },
}

/// Outcome of a dispatch run, as reported to callers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub status: CampaignStatus,
    pub sent_count: u32,
    pub failed_count: u32,
    pub total_recipients: u32,
}

impl Campaign {
    pub fn new(
        subject: String,
        content: String,
        recipients: Vec<Recipient>,
        created_by: String,
    ) -> Campaign {
        let mut campaign = Campaign {
            id: CampaignId::new(),
            subject,
            content,
            recipients,
            status: CampaignStatus::Draft,
            total_recipients: 0,
            sent_count: 0,
            failed_count: 0,
            created_by,
            created_at: Utc::now(),
            completed_at: None,
        };
        campaign.recount();
        campaign
    }

    pub fn total_recipients(&self) -> u32 {
        self.total_recipients
    }

    pub fn sent_count(&self) -> u32 {
        self.sent_count
    }

    pub fn failed_count(&self) -> u32 {
        self.failed_count
    }

    pub fn has_pending(&self) -> bool {
        self.recipients.iter().any(Recipient::is_pending)
    }

    /// Resolves a pending recipient. Recipients that are already resolved are
    /// left alone; returns whether anything changed.
    pub fn resolve(&mut self, index: usize, delivery: Delivery) -> bool {
        let recipient = match self.recipients.get_mut(index) {
            Some(recipient) if recipient.is_pending() => recipient,
            _ => return false,
        };

        match delivery {
            Delivery::Sent { at } => {
                recipient.status = RecipientStatus::Sent;
                recipient.sent_at = Some(at);
                recipient.error = None;
            }
            Delivery::Failed { error } => {
                recipient.status = RecipientStatus::Failed;
                recipient.error = Some(error);
            }
        }

        self.recount();
        true
    }

    /// Terminal status implied by the recipient states.
    pub fn final_status(&self) -> CampaignStatus {
        if self.sent_count == self.total_recipients {
            CampaignStatus::Completed
        } else if self.sent_count == 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Partial
        }
    }

    pub fn result(&self) -> DispatchResult {
        DispatchResult {
            status: self.status,
            sent_count: self.sent_count,
            failed_count: self.failed_count,
            total_recipients: self.total_recipients,
        }
    }

    fn recount(&mut self) {
        let count = |status| {
            self.recipients
                .iter()
                .filter(|recipient| recipient.status == status)
                .count() as u32
        };

        self.sent_count = count(RecipientStatus::Sent);
        self.failed_count = count(RecipientStatus::Failed);
        self.total_recipients = self.recipients.len() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign_of(emails: &[&str]) -> Campaign {
        let recipients = emails
            .iter()
            .map(|email| Recipient::pending(email.to_string(), String::new()))
            .collect();
        Campaign::new("Hi".into(), "Hello".into(), recipients, "owner@x.com".into())
    }

    #[test]
    fn new_campaign_is_draft_with_counts() {
        let campaign = campaign_of(&["a@x.com", "b@x.com"]);

        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.total_recipients(), 2);
        assert_eq!(campaign.sent_count(), 0);
        assert_eq!(campaign.failed_count(), 0);
        assert!(campaign.has_pending());
    }

    #[test]
    fn resolved_recipients_never_return_to_pending() {
        let mut campaign = campaign_of(&["a@x.com"]);
        let error = Delivery::Failed {
            error: "rejected".into(),
        };

        assert!(campaign.resolve(0, error.clone()));
        assert!(!campaign.resolve(0, Delivery::Sent { at: Utc::now() }));
        assert!(!campaign.resolve(7, error));

        assert_eq!(campaign.recipients[0].status, RecipientStatus::Failed);
        assert_eq!(campaign.recipients[0].error.as_deref(), Some("rejected"));
        assert_eq!(campaign.failed_count(), 1);
        assert_eq!(campaign.sent_count(), 0);
    }

    #[test]
    fn final_status_follows_recipient_outcomes() {
        let sent = || Delivery::Sent { at: Utc::now() };
        let failed = || Delivery::Failed {
            error: "boom".into(),
        };

        let mut all_sent = campaign_of(&["a@x.com", "b@x.com"]);
        all_sent.resolve(0, sent());
        all_sent.resolve(1, sent());
        assert_eq!(all_sent.final_status(), CampaignStatus::Completed);

        let mut all_failed = campaign_of(&["a@x.com", "b@x.com"]);
        all_failed.resolve(0, failed());
        all_failed.resolve(1, failed());
        assert_eq!(all_failed.final_status(), CampaignStatus::Failed);

        let mut mixed = campaign_of(&["a@x.com", "b@x.com"]);
        mixed.resolve(0, sent());
        mixed.resolve(1, failed());
        assert_eq!(mixed.final_status(), CampaignStatus::Partial);
    }

    #[test]
    fn stores_statuses_in_lowercase() {
        let campaign = campaign_of(&["a@x.com"]);
        let json = serde_json::to_value(&campaign.recipients[0]).unwrap();

        assert_eq!(json["status"], "pending");
        assert!(json.get("sentAt").is_none());
        assert_eq!(
            serde_json::to_value(CampaignStatus::Partial).unwrap(),
            "partial"
        );
    }
}
