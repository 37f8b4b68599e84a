use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{Error as DatabaseError, ErrorKind, WriteFailure};
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::MongoGroupStore;
use crate::error::Error;

use super::{name_key, Group};

const GROUPS: &str = "groups";

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(error: &DatabaseError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": GROUPS,
            "indexes": [
                { "key": { "createdBy": 1, "nameKey": 1 }, "name": "by_owner_and_name", "unique": true },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Fails with `GroupAlreadyExists` when the owner already has a group
    /// with the same name, ignoring case.
    async fn insert_group(&self, group: &Group) -> Result<(), Error>;

    async fn fetch_groups_by_creator(&self, created_by: &str) -> Result<Vec<Group>, Error>;

    /// Looks a group up by name, ignoring case.
    async fn fetch_group_by_name(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Group>, Error>;
}

#[async_trait]
impl GroupStore for MongoGroupStore {
    #[tracing::instrument(skip(self))]
    async fn insert_group(&self, group: &Group) -> Result<(), Error> {
        match self.insert_one(group, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(Error::GroupAlreadyExists {
                group_name: group.name.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_groups_by_creator(&self, created_by: &str) -> Result<Vec<Group>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "createdAt": -1 })
            .build();

        let groups: Vec<Group> = self
            .find(bson::doc! { "createdBy": created_by }, options)
            .await?
            .try_collect()
            .await?;

        Ok(groups)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_group_by_name(
        &self,
        created_by: &str,
        name: &str,
    ) -> Result<Option<Group>, Error> {
        let group: Option<Group> = self
            .find_one(
                bson::doc! { "createdBy": created_by, "nameKey": name_key(name) },
                None,
            )
            .await?;

        Ok(group)
    }
}
