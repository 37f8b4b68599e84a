use std::sync::Arc;

use actix_web::web::{self, Data, JsonConfig, PathConfig, QueryConfig};
use actix_web::{App, HttpServer, ResponseError};
use mongodb::Client;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

pub mod campaign;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod group;
pub mod health;
pub mod transport;
pub mod typedid;
pub mod user;
pub mod utils;

pub use crate::config::Config;
pub use crate::error::Error;

use crate::database::{Database, MemoryDatabase, MongoDatabase};
use crate::dispatch::DispatchEngine;
use crate::transport::{MailTransport, SmtpTransport};
use crate::user::Authenticator;

/// Registers every endpoint. The app data needed by the handlers
/// (`Data<dyn Database>`, `Data<DispatchEngine>` and `Data<Authenticator>`)
/// is left to the caller.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
        // format json errors with custom format
        Error::InvalidJson(err).into()
    }))
    .app_data(PathConfig::default().error_handler(|err, _req| {
        // format path errors with custom format
        Error::InvalidPath(err).into()
    }))
    .app_data(QueryConfig::default().error_handler(|err, _req| {
        // format query errors with custom format
        Error::InvalidQuery(err).into()
    }))
    .service(health::get_health)
    .service(campaign::endpoints::send_bulk_email)
    // must come before the `{email_id}` route
    .service(campaign::endpoints::get_email_history)
    .service(campaign::endpoints::get_email_by_id)
    .service(group::endpoints::create_group)
    .service(group::endpoints::get_groups)
    .service(group::endpoints::send_group_email)
    .default_service(web::to(|| async { Error::PathNotFound.error_response() }));
}

pub async fn run(config: Config) -> Result<(), Error> {
    let db: Arc<dyn Database> = match &config.mongo_uri {
        Some(uri) => {
            info!("connecting to db: {}", config.database_name);
            let db = Client::with_uri_str(uri)
                .await?
                .database(&config.database_name);
            let db = MongoDatabase::initialize(db).await?;
            db.ping().await?;
            Arc::new(db)
        }
        None => {
            warn!("MONGO_URI is not set, campaigns and groups are kept in memory");
            Arc::new(MemoryDatabase::new())
        }
    };

    let transport: Arc<dyn MailTransport> = Arc::new(SmtpTransport::new(&config.smtp())?);
    let engine = DispatchEngine::new(db.clone(), transport, config.dispatch());

    let db = Data::from(db);
    let engine = Data::new(engine);
    let authenticator = Data::new(Authenticator::new(&config.jwt_secret));

    info!("listening on {}", config.bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(engine.clone())
            .app_data(authenticator.clone())
            .wrap(TracingLogger::default())
            .configure(routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}
