use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::campaign::intake::normalize_email;
use crate::database::Database;
use crate::error::Error;
use crate::transport::{Envelope, MailTransport, Sender};
use crate::user::Identity;

use super::{name_key, Group, GroupId, GroupMember};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GroupMemberRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// A one-off message to (part of) a group. When `to`, `cc` and `bcc` are all
/// empty, `mode` names the list that receives every member.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSendRequest {
    pub group_name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub mode: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSendSummary {
    pub recipient_count: usize,
    pub to_count: usize,
    pub cc_count: usize,
    pub bcc_count: usize,
}

#[tracing::instrument(skip(db, owner, members), fields(owner = %owner.email))]
pub async fn create_group(
    db: &dyn Database,
    owner: &Identity,
    name: Option<String>,
    members: Vec<GroupMemberRequest>,
) -> Result<Group, Error> {
    let name = name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(Error::MissingGroupFields)?;

    let mut seen = HashSet::new();
    let members: Vec<GroupMember> = members
        .into_iter()
        .filter_map(|member| {
            let email = normalize_email(&member.email?);
            if email.is_empty() || !seen.insert(email.clone()) {
                return None;
            }
            let name = member.name.unwrap_or_default().trim().to_string();
            Some(GroupMember { email, name })
        })
        .collect();

    if members.is_empty() {
        return Err(Error::MissingGroupFields);
    }

    if db
        .groups()
        .fetch_group_by_name(&owner.email, &name)
        .await?
        .is_some()
    {
        return Err(Error::GroupAlreadyExists { group_name: name });
    }

    let group = Group {
        id: GroupId::new(),
        name_key: name_key(&name),
        name,
        members,
        created_by: owner.email.clone(),
        created_at: Utc::now(),
    };

    db.groups().insert_group(&group).await?;

    Ok(group)
}

#[tracing::instrument(skip(db, owner), fields(owner = %owner.email))]
pub async fn get_groups(db: &dyn Database, owner: &Identity) -> Result<Vec<Group>, Error> {
    let groups = db.groups().fetch_groups_by_creator(&owner.email).await?;

    Ok(groups)
}

#[tracing::instrument(skip(db, transport, sender, owner, request), fields(owner = %owner.email))]
pub async fn send_group_email(
    db: &dyn Database,
    transport: &dyn MailTransport,
    sender: &Sender,
    owner: &Identity,
    request: GroupSendRequest,
) -> Result<GroupSendSummary, Error> {
    let required = |value: Option<String>| {
        value
            .filter(|value| !value.trim().is_empty())
            .ok_or(Error::MissingGroupFields)
    };
    let group_name = required(request.group_name)?;
    let subject = required(request.subject)?;
    let content = required(request.content)?;

    let group = db
        .groups()
        .fetch_group_by_name(&owner.email, &group_name)
        .await?
        .ok_or_else(|| Error::GroupNotFound {
            group_name: group_name.clone(),
        })?;

    let (mut to, mut cc, mut bcc) = (request.to, request.cc, request.bcc);

    if to.is_empty() && cc.is_empty() && bcc.is_empty() {
        if let Some(mode) = request.mode {
            let everyone = group.members.iter().map(|m| m.email.clone()).collect();
            match mode.as_str() {
                "to" => to = everyone,
                "cc" => cc = everyone,
                "bcc" => bcc = everyone,
                _ => return Err(Error::InvalidSendMode { mode }),
            }
        }
    }

    if to.is_empty() && cc.is_empty() && bcc.is_empty() {
        return Err(Error::NoGroupRecipients { group_name });
    }

    let members_only = |addresses: Vec<String>| -> Vec<String> {
        addresses
            .into_iter()
            .filter(|address| group.has_member(address))
            .collect()
    };
    let (to, cc, bcc) = (members_only(to), members_only(cc), members_only(bcc));

    let summary = GroupSendSummary {
        recipient_count: to.len() + cc.len() + bcc.len(),
        to_count: to.len(),
        cc_count: cc.len(),
        bcc_count: bcc.len(),
    };

    let envelope = Envelope {
        from: sender.clone(),
        // without a visible recipient the message goes to the sender itself
        to: if to.is_empty() {
            vec![sender.email.clone()]
        } else {
            to
        },
        cc,
        bcc,
        subject,
        html: content,
    };

    transport.send(&envelope).await.map_err(|err| {
        tracing::error!(error = %err, "group send failed");
        Error::GroupSendFailed {
            reason: err.to_string(),
        }
    })?;

    Ok(summary)
}
