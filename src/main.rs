use anyhow::Result;
use deep_research::config::{SearchProvider, Settings};
use deep_research::server::{router, AppState};
use deep_research::tools::firecrawl::FirecrawlSearch;
use deep_research::tools::llm::RigBackend;
use deep_research::tools::tavily::TavilySearch;
use deep_research::tools::SearchClient;
use deep_research::StructuredGenerator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("deep_research=debug,graph_flow=info,tower_http=info")
        }))
        .init();

    let settings = Settings::from_env()?;

    let backend = Arc::new(RigBackend::new(
        &settings.openai_api_key,
        settings.openai_model.clone(),
        settings.openai_base_url.as_deref(),
    ));
    let generator = Arc::new(StructuredGenerator::new(backend));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let search: Arc<dyn SearchClient> = match settings.search_provider {
        SearchProvider::Tavily => Arc::new(TavilySearch::new(http, settings.search_api_key.clone())),
        SearchProvider::Firecrawl => {
            Arc::new(FirecrawlSearch::new(http, settings.search_api_key.clone()))
        }
    };

    let state = AppState::new(generator, search, settings.concurrency);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    info!(
        "Deep research server running on http://{} (model {}, concurrency {})",
        settings.bind_addr, settings.openai_model, settings.concurrency
    );

    axum::serve(listener, app).await?;
    Ok(())
}
