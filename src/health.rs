use actix_web::get;
use actix_web::web::{Data, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::utils::SuccessBody;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

/// Liveness probe. Always answers, reporting whether the store responds.
#[get("/health")]
#[tracing::instrument(skip(db))]
pub async fn get_health(db: Data<dyn Database>) -> Json<SuccessBody<HealthBody>> {
    let database = match db.ping().await {
        Ok(()) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            "disconnected"
        }
    };

    Json(SuccessBody::with_message(
        "Server is running",
        HealthBody {
            database: database.into(),
            timestamp: Utc::now(),
        },
    ))
}
