use async_trait::async_trait;
use mongodb::{bson, Collection};

use crate::campaign::db::CampaignStore;
use crate::campaign::Campaign;
use crate::error::Error;
use crate::group::db::GroupStore;
use crate::group::Group;

pub mod memory;

pub use memory::MemoryDatabase;

pub type MongoCampaignStore = Collection<Campaign>;
pub type MongoGroupStore = Collection<Group>;

#[async_trait]
pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;

    fn groups(&self) -> &dyn GroupStore;

    async fn ping(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: Collection<Campaign>,
    groups: Collection<Group>,
    db: mongodb::Database,
}

impl MongoDatabase {
    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        crate::campaign::db::initialize(&db).await?;
        crate::group::db::initialize(&db).await?;

        Ok(MongoDatabase {
            campaigns: db.collection("campaigns"),
            groups: db.collection("groups"),
            db,
        })
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn groups(&self) -> &dyn GroupStore {
        &self.groups
    }

    async fn ping(&self) -> Result<(), Error> {
        self.db.run_command(bson::doc! { "ping": 1 }, None).await?;

        Ok(())
    }
}
