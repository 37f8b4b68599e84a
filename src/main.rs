use bulkmail::{Config, Error};
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    bulkmail::run(config).await
}
