use llm_blend_proxy::{config::ProxyConfig, state::AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,llm_blend_proxy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ProxyConfig::from_env()?;
    let addr = settings.listen_addr;
    let state = AppState::new(settings)?;
    info!(
        backends = %state.registry.addresses().collect::<Vec<_>>().join(","),
        pool_size = state.registry.len(),
        "backend pool configured"
    );

    let app = llm_blend_proxy::build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "blend proxy listening");

    axum::serve(listener, app).await?;
    Ok(())
}
