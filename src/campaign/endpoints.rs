use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::dispatch::DispatchEngine;
use crate::error::Error;
use crate::user::Caller;
use crate::utils::SuccessBody;

use super::intake::{CampaignRequest, RecipientRequest};
use super::{manager, Campaign, CampaignId, CampaignStatus, Recipient, RecipientStatus};

/// Either a new campaign, or `emailId` to resume an existing one.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkBody {
    pub email_id: Option<CampaignId>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub recipients: Option<Vec<RecipientRequest>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkResultBody {
    pub email_id: CampaignId,
    pub total_recipients: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientBody {
    pub email: String,
    pub name: String,
    pub status: RecipientStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RecipientBody {
    pub fn render(recipient: Recipient) -> RecipientBody {
        RecipientBody {
            email: recipient.email,
            name: recipient.name,
            status: recipient.status,
            sent_at: recipient.sent_at,
            error: recipient.error,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummaryBody {
    pub id: CampaignId,
    pub subject: String,
    pub status: CampaignStatus,
    pub total_recipients: u32,
    pub sent_count: u32,
    pub failed_count: u32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CampaignSummaryBody {
    pub fn render(campaign: &Campaign) -> CampaignSummaryBody {
        CampaignSummaryBody {
            id: campaign.id,
            subject: campaign.subject.clone(),
            status: campaign.status,
            total_recipients: campaign.total_recipients(),
            sent_count: campaign.sent_count(),
            failed_count: campaign.failed_count(),
            created_by: campaign.created_by.clone(),
            created_at: campaign.created_at,
            completed_at: campaign.completed_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBody {
    #[serde(flatten)]
    pub summary: CampaignSummaryBody,
    pub content: String,
    pub recipients: Vec<RecipientBody>,
}

impl CampaignBody {
    pub fn render(campaign: Campaign) -> CampaignBody {
        CampaignBody {
            summary: CampaignSummaryBody::render(&campaign),
            content: campaign.content,
            recipients: campaign
                .recipients
                .into_iter()
                .map(RecipientBody::render)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignHistoryBody {
    pub emails: Vec<CampaignSummaryBody>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignDetailBody {
    pub email: CampaignBody,
}

#[post("/email/send-bulk")]
#[tracing::instrument(skip(db, engine, body))]
pub async fn send_bulk_email(
    db: Data<dyn Database>,
    engine: Data<DispatchEngine>,
    caller: Caller,
    body: Json<SendBulkBody>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();

    let (campaign, message) = match body.email_id {
        Some(campaign_id) => {
            let campaign = manager::expect_owned_campaign(&**db, &caller, campaign_id).await?;
            (campaign, "Re-processing queued")
        }
        None => {
            let request = CampaignRequest {
                subject: body.subject,
                content: body.content,
                recipients: body.recipients,
            };
            let campaign = manager::create_campaign(&**db, &caller, request).await?;
            (campaign, "New email job created and sending started")
        }
    };

    engine.spawn(campaign.id);

    let body = SendBulkResultBody {
        email_id: campaign.id,
        total_recipients: campaign.total_recipients(),
    };

    Ok(HttpResponse::Accepted().json(SuccessBody::with_message(message, body)))
}

#[get("/email/history")]
#[tracing::instrument(skip(db))]
pub async fn get_email_history(
    db: Data<dyn Database>,
    caller: Caller,
) -> Result<Json<SuccessBody<CampaignHistoryBody>>, Error> {
    let campaigns = manager::get_campaign_history(&**db, &caller).await?;

    let body = CampaignHistoryBody {
        emails: campaigns.iter().map(CampaignSummaryBody::render).collect(),
    };

    Ok(Json(SuccessBody::new(body)))
}

#[get("/email/{email_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_email_by_id(
    db: Data<dyn Database>,
    caller: Caller,
    params: Path<CampaignId>,
) -> Result<Json<SuccessBody<CampaignDetailBody>>, Error> {
    let campaign_id = params.into_inner();

    let campaign = manager::expect_owned_campaign(&**db, &caller, campaign_id).await?;

    let body = CampaignDetailBody {
        email: CampaignBody::render(campaign),
    };

    Ok(Json(SuccessBody::new(body)))
}
