use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::MongoCampaignStore;
use crate::error::Error;

use super::{Campaign, CampaignId, CampaignStatus};

const CAMPAIGNS: &str = "campaigns";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CAMPAIGNS,
            "indexes": [
                { "key": { "createdBy": 1, "createdAt": -1 }, "name": "by_created_by" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error>;

    async fn fetch_campaigns_by_creator(&self, created_by: &str) -> Result<Vec<Campaign>, Error>;

    /// Moves a campaign (back) to `sending` and clears any completion time
    /// left by an earlier run.
    async fn mark_campaign_sending(&self, campaign_id: CampaignId) -> Result<(), Error>;

    /// Persists the recipient list and the counters derived from it.
    async fn checkpoint_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    /// Persists a terminal status along with the final counters.
    async fn finish_campaign(&self, campaign: &Campaign) -> Result<(), Error>;
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.insert_one(campaign, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign: Option<Campaign> = self
            .find_one(bson::doc! { "_id": campaign_id }, None)
            .await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns_by_creator(&self, created_by: &str) -> Result<Vec<Campaign>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "createdAt": -1 })
            .build();

        let campaigns: Vec<Campaign> = self
            .find(bson::doc! { "createdBy": created_by }, options)
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_campaign_sending(&self, campaign_id: CampaignId) -> Result<(), Error> {
        let new_status = bson::to_bson(&CampaignStatus::Sending)?;

        let result = self
            .update_one(
                bson::doc! { "_id": campaign_id },
                bson::doc! {
                    "$set": { "status": new_status },
                    "$unset": { "completedAt": "" },
                },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::CampaignNotFound { campaign_id });
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn checkpoint_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        let recipients = bson::to_bson(&campaign.recipients)?;

        let result = self
            .update_one(
                bson::doc! { "_id": campaign.id },
                bson::doc! { "$set": {
                    "recipients": recipients,
                    "totalRecipients": campaign.total_recipients() as i64,
                    "sentCount": campaign.sent_count() as i64,
                    "failedCount": campaign.failed_count() as i64,
                } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::CampaignNotFound {
                campaign_id: campaign.id,
            });
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn finish_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        let new_status = bson::to_bson(&campaign.status)?;
        let completed_at = campaign.completed_at.map(bson::DateTime::from_chrono);

        let result = self
            .update_one(
                bson::doc! { "_id": campaign.id },
                bson::doc! { "$set": {
                    "status": new_status,
                    "totalRecipients": campaign.total_recipients() as i64,
                    "sentCount": campaign.sent_count() as i64,
                    "failedCount": campaign.failed_count() as i64,
                    "completedAt": completed_at,
                } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::CampaignNotFound {
                campaign_id: campaign.id,
            });
        }

        Ok(())
    }
}
