use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::campaign::db::CampaignStore;
use crate::campaign::{Campaign, CampaignId, CampaignStatus};
use crate::error::Error;
use crate::group::db::GroupStore;
use crate::group::{name_key, Group};

use super::Database;

/// Process-local database. Used when no MongoDB uri is configured and as the
/// store in tests, where the checkpoint counter is asserted on.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    campaigns: MemoryCampaignStore,
    groups: MemoryGroupStore,
}

#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    campaigns: Mutex<HashMap<CampaignId, Campaign>>,
    checkpoints: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: Mutex<Vec<Group>>,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }

    /// Number of checkpoints written so far, across all campaigns.
    pub fn checkpoints(&self) -> usize {
        self.campaigns.checkpoints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn groups(&self) -> &dyn GroupStore {
        &self.groups
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Error> {
    mutex
        .lock()
        .map_err(|_| Error::ExistentialState("memory store lock poisoned".into()))
}

impl MemoryCampaignStore {
    fn update<F>(&self, campaign_id: CampaignId, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Campaign),
    {
        let mut campaigns = lock(&self.campaigns)?;
        let stored = campaigns
            .get_mut(&campaign_id)
            .ok_or(Error::CampaignNotFound { campaign_id })?;
        f(stored);

        Ok(())
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        lock(&self.campaigns)?.insert(campaign.id, campaign.clone());

        Ok(())
    }

    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        Ok(lock(&self.campaigns)?.get(&campaign_id).cloned())
    }

    async fn fetch_campaigns_by_creator(&self, created_by: &str) -> Result<Vec<Campaign>, Error> {
        let mut campaigns: Vec<Campaign> = lock(&self.campaigns)?
            .values()
            .filter(|campaign| campaign.created_by == created_by)
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(campaigns)
    }

    async fn mark_campaign_sending(&self, campaign_id: CampaignId) -> Result<(), Error> {
        self.update(campaign_id, |stored| {
            stored.status = CampaignStatus::Sending;
            stored.completed_at = None;
        })
    }

    async fn checkpoint_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.update(campaign.id, |stored| {
            let status = stored.status;
            let completed_at = stored.completed_at;
            *stored = campaign.clone();
            stored.status = status;
            stored.completed_at = completed_at;
        })?;
        self.checkpoints.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn finish_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.update(campaign.id, |stored| {
            let recipients = std::mem::take(&mut stored.recipients);
            *stored = campaign.clone();
            stored.recipients = recipients;
        })
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn insert_group(&self, group: &Group) -> Result<(), Error> {
        let mut groups = lock(&self.groups)?;
        let taken = groups
            .iter()
            .any(|other| other.created_by == group.created_by && other.name_key == group.name_key);
        if taken {
            return Err(Error::GroupAlreadyExists {
                group_name: group.name.clone(),
            });
        }
        groups.push(group.clone());

        Ok(())
    }

    async fn fetch_groups_by_creator(&self, created_by: &str) -> Result<Vec<Group>, Error> {
        let mut groups: Vec<Group> = lock(&self.groups)?
            .iter()
            .filter(|group| group.created_by == created_by)
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(groups)
    }

    async fn fetch_group_by_name(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Group>, Error> {
        let key = name_key(name);
        let group = lock(&self.groups)?
            .iter()
            .find(|group| group.created_by == created_by && group.name_key == key)
            .cloned();

        Ok(group)
    }
}
