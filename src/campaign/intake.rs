use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Error;

use super::{Campaign, Recipient};

/// A bulk-send request as it arrives from a client. Every field is optional
/// here so that missing fields surface as validation errors rather than as
/// json parse errors.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub subject: Option<String>,
    pub content: Option<String>,
    pub recipients: Option<Vec<RecipientRequest>>,
}

/// One entry of `recipients`. Any json value is accepted; an entry that is
/// not an object, or whose `email` is not a string, ends up without an email
/// and is dropped by [`intake`].
#[derive(Clone, Debug, Default)]
pub struct RecipientRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl<'de> Deserialize<'de> for RecipientRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(RecipientRequest {
            email: text("email"),
            name: text("name"),
        })
    }
}

/// Lower-cased and trimmed, the form in which addresses are compared.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Builds a draft campaign out of a request. Recipients without an email are
/// dropped and repeated addresses keep their first occurrence.
pub fn intake(request: CampaignRequest, created_by: String) -> Result<Campaign, Error> {
    let subject = request
        .subject
        .map(|subject| subject.trim().to_string())
        .filter(|subject| !subject.is_empty())
        .ok_or(Error::MissingCampaignFields)?;
    let content = request
        .content
        .filter(|content| !content.is_empty())
        .ok_or(Error::MissingCampaignFields)?;
    let requested = request
        .recipients
        .filter(|recipients| !recipients.is_empty())
        .ok_or(Error::MissingCampaignFields)?;

    let mut seen = HashSet::new();
    let recipients: Vec<Recipient> = requested
        .into_iter()
        .filter_map(|recipient| {
            let email = normalize_email(&recipient.email?);
            if email.is_empty() || !seen.insert(email.clone()) {
                return None;
            }
            let name = recipient.name.unwrap_or_default().trim().to_string();
            Some(Recipient::pending(email, name))
        })
        .collect();

    if recipients.is_empty() {
        return Err(Error::NoValidRecipients);
    }

    Ok(Campaign::new(subject, content, recipients, created_by))
}
