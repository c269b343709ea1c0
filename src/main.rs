use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use wcag_mend::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    wcag_mend::load_env();

    let config = Arc::new(Config::load()?);

    tracing_subscriber::fmt()
        .with_env_filter(config.runtime.log_level.clone())
        .init();

    info!("Starting wcag-mend correction service");

    let pipeline = Arc::new(wcag_mend::build_pipeline(&config)?);
    if !pipeline.model_available() {
        info!("No generative model loaded; fix requests will report unavailability");
    }

    wcag_mend::http::start_http_server(config, pipeline).await?;

    Ok(())
}
