#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Data;
use bulkmail::database::{Database, MemoryDatabase};
use bulkmail::dispatch::{DispatchEngine, DispatchSettings};
use bulkmail::transport::{MemoryTransport, Sender};
use bulkmail::user::{Authenticator, Identity, UserId};

pub struct TestContext {
    pub db: Arc<MemoryDatabase>,
    pub transport: Arc<MemoryTransport>,
    pub engine: Data<DispatchEngine>,
    pub authenticator: Data<Authenticator>,
}

impl TestContext {
    pub fn new() -> TestContext {
        TestContext::with_transport(MemoryTransport::new())
    }

    pub fn with_transport(transport: MemoryTransport) -> TestContext {
        let db = Arc::new(MemoryDatabase::new());
        let transport = Arc::new(transport);

        let mut settings = DispatchSettings::new(Sender {
            email: "news@x.com".into(),
            name: Some("News".into()),
        });
        settings.send_delay = Duration::ZERO;
        let engine = DispatchEngine::new(db.clone(), transport.clone(), settings);

        TestContext {
            db,
            transport,
            engine: Data::new(engine),
            authenticator: Data::new(Authenticator::new("integration secret")),
        }
    }

    pub fn database(&self) -> Data<dyn Database> {
        Data::from(self.db.clone() as Arc<dyn Database>)
    }

    /// An `Authorization` header value for a user with the given email.
    pub fn bearer(&self, email: &str) -> String {
        let identity = Identity {
            id: UserId::new(),
            email: email.into(),
            name: "Tester".into(),
        };
        let token = self
            .authenticator
            .issue(&identity, chrono::Duration::hours(1))
            .unwrap();

        format!("Bearer {}", token)
    }
}

/// Builds the service under test for a [`TestContext`].
macro_rules! init_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.database())
                .app_data($ctx.engine.clone())
                .app_data($ctx.authenticator.clone())
                .configure(bulkmail::routes),
        )
        .await
    };
}
