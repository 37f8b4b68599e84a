use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type GroupId = TypedId<Group>;

/// A named, reusable list of addresses owned by one user.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: GroupId,
    pub name: String,
    /// Lower-cased name; group names are unique per owner ignoring case.
    pub name_key: String,
    pub members: Vec<GroupMember>,
    pub created_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for Group {
    fn tag() -> &'static str {
        "GRP"
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct GroupMember {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Group {
    pub fn has_member(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.members.iter().any(|member| member.email == email)
    }
}
