use crate::database::Database;
use crate::error::Error;
use crate::user::Identity;

use super::intake::{self, CampaignRequest};
use super::{Campaign, CampaignId};

#[tracing::instrument(skip(db, owner, request), fields(owner = %owner.email))]
pub async fn create_campaign(
    db: &dyn Database,
    owner: &Identity,
    request: CampaignRequest,
) -> Result<Campaign, Error> {
    let campaign = intake::intake(request, owner.email.clone())?;

    db.campaigns().insert_campaign(&campaign).await?;

    Ok(campaign)
}

#[tracing::instrument(skip(db))]
pub async fn get_campaign_by_id(
    db: &dyn Database,
    campaign_id: CampaignId,
) -> Result<Option<Campaign>, Error> {
    let campaign = db.campaigns().fetch_campaign_by_id(campaign_id).await?;

    Ok(campaign)
}

/// Fetches a campaign on behalf of `owner`, who must have created it.
#[tracing::instrument(skip(db, owner), fields(owner = %owner.email))]
pub async fn expect_owned_campaign(
    db: &dyn Database,
    owner: &Identity,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let campaign = get_campaign_by_id(db, campaign_id)
        .await?
        .ok_or(Error::CampaignNotFound { campaign_id })?;

    if campaign.created_by != owner.email {
        return Err(Error::CampaignNotOwned { campaign_id });
    }

    Ok(campaign)
}

#[tracing::instrument(skip(db, owner), fields(owner = %owner.email))]
pub async fn get_campaign_history(
    db: &dyn Database,
    owner: &Identity,
) -> Result<Vec<Campaign>, Error> {
    let campaigns = db.campaigns().fetch_campaigns_by_creator(&owner.email).await?;

    Ok(campaigns)
}
