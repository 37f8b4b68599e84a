use actix_web::web::{Data, Json};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::dispatch::DispatchEngine;
use crate::error::Error;
use crate::user::Caller;
use crate::utils::SuccessBody;

use super::manager::{self, GroupMemberRequest, GroupSendRequest, GroupSendSummary};
use super::{Group, GroupId, GroupMember};

#[derive(Clone, Debug, Deserialize)]
pub struct CreateGroupBody {
    pub name: Option<String>,
    #[serde(default, alias = "members")]
    pub emails: Vec<GroupMemberRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBody {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<GroupMember>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl GroupBody {
    pub fn render(group: Group) -> GroupBody {
        GroupBody {
            id: group.id,
            name: group.name,
            members: group.members,
            created_by: group.created_by,
            created_at: group.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupCreatedBody {
    pub group: GroupBody,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupListBody {
    pub groups: Vec<GroupBody>,
}

#[post("/groups/create")]
#[tracing::instrument(skip(db, body))]
pub async fn create_group(
    db: Data<dyn Database>,
    caller: Caller,
    body: Json<CreateGroupBody>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();

    let group = manager::create_group(&**db, &caller, body.name, body.emails).await?;

    let body = GroupCreatedBody {
        group: GroupBody::render(group),
    };

    Ok(HttpResponse::Created().json(SuccessBody::new(body)))
}

#[get("/groups")]
#[tracing::instrument(skip(db))]
pub async fn get_groups(
    db: Data<dyn Database>,
    caller: Caller,
) -> Result<Json<SuccessBody<GroupListBody>>, Error> {
    let groups = manager::get_groups(&**db, &caller).await?;

    let body = GroupListBody {
        groups: groups.into_iter().map(GroupBody::render).collect(),
    };

    Ok(Json(SuccessBody::new(body)))
}

#[post("/groups/send")]
#[tracing::instrument(skip(db, engine, body))]
pub async fn send_group_email(
    db: Data<dyn Database>,
    engine: Data<DispatchEngine>,
    caller: Caller,
    body: Json<GroupSendRequest>,
) -> Result<Json<SuccessBody<GroupSendSummary>>, Error> {
    let summary = manager::send_group_email(
        &**db,
        engine.transport(),
        engine.sender(),
        &caller,
        body.into_inner(),
    )
    .await?;

    Ok(Json(SuccessBody::with_message(
        "Group email sent successfully",
        summary,
    )))
}
