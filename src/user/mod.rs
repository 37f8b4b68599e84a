use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub mod auth;

pub use auth::{Authenticator, Caller};

pub type UserId = TypedId<User>;

#[derive(Clone, Debug)]
pub struct User;

impl TypedIdMarker for User {
    fn tag() -> &'static str {
        "USR"
    }
}

/// The authenticated user behind a request. Campaigns and groups are scoped
/// by `email`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub name: String,
}
