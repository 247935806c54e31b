// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc, time::Duration};

use dashboard_graphs::application::data_source_loader::DataSourceLoader;
use dashboard_graphs::application::graph_service::GraphService;
use dashboard_graphs::application::history_cache::HistoryCache;
use dashboard_graphs::application::history_repository::{HistoryRepository, KeyValueStore, SystemClock};
use dashboard_graphs::application::tooltip::TooltipController;
use dashboard_graphs::infrastructure::config::{load_graphs_config, load_server_config};
use dashboard_graphs::infrastructure::event_stream::EventBus;
use dashboard_graphs::infrastructure::ha_rest::HomeAssistantRest;
use dashboard_graphs::infrastructure::ha_websocket::HomeAssistantWebSocket;
use dashboard_graphs::infrastructure::preferred_history::PreferredHistory;
use dashboard_graphs::infrastructure::state_snapshot::StateSnapshot;
use dashboard_graphs::infrastructure::store::{FileStore, MemoryStore};
use dashboard_graphs::presentation::app_state::AppState;
use dashboard_graphs::presentation::handlers::router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let server_config = load_server_config()?;
    let graphs_config = load_graphs_config()?;

    // Create transports (infrastructure layer)
    let rest = Arc::new(HomeAssistantRest::new(&server_config.home_assistant)?);
    let websocket: Option<Arc<dyn HistoryRepository>> = if server_config.home_assistant.prefer_websocket {
        Some(Arc::new(HomeAssistantWebSocket::new(&server_config.home_assistant)))
    } else {
        None
    };
    let history = Arc::new(PreferredHistory::new(websocket, rest.clone()));
    let live_states = Arc::new(StateSnapshot::new());

    let store: Arc<dyn KeyValueStore> = match &server_config.cache_path {
        Some(path) => match FileStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!("History cache directory unusable, keeping it in memory: {:#}", e);
                Arc::new(MemoryStore::default())
            }
        },
        None => Arc::new(MemoryStore::default()),
    };

    // Seed live states before the first fast path
    match rest.fetch_states().await {
        Ok(states) => {
            tracing::info!("Loaded {} entity states", states.len());
            live_states.replace(states);
        }
        Err(e) => tracing::warn!("Initial state snapshot failed: {:#}", e),
    }

    // Create services (application layer)
    let clock = Arc::new(SystemClock);
    let events = Arc::new(EventBus::new());
    let cache = Arc::new(HistoryCache::new(store, clock.clone()));
    let loader = Arc::new(DataSourceLoader::new(
        history,
        rest.clone(),
        live_states.clone(),
        cache,
        events.clone(),
        clock,
    ));
    let graph_service = GraphService::new(loader, Arc::new(TooltipController::new(events.clone())));

    for module in graphs_config.modules {
        let id = module.id.clone();
        if let Err(e) = graph_service.configure(module) {
            tracing::error!("Skipping module {}: {}", id, e);
        }
    }

    // Keep live states current
    let refresh_rest = rest.clone();
    let refresh_states = live_states.clone();
    let state_interval = Duration::from_secs(server_config.state_refresh_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match refresh_rest.fetch_states().await {
                Ok(states) => refresh_states.replace(states),
                Err(e) => tracing::warn!("State snapshot refresh failed: {:#}", e),
            }
        }
    });

    // Refetch history once cached payloads have gone stale
    let refresh_service = graph_service.clone();
    let history_interval = Duration::from_secs(server_config.history_refresh_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(history_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let scheduled = refresh_service.refresh_all();
            tracing::debug!("Scheduled {} history refreshes", scheduled);
        }
    });

    // Create application state
    let state = Arc::new(AppState { graph_service, events });

    // Build router (presentation layer)
    let app = router(state);

    // Start server
    let addr: SocketAddr = server_config.bind_addr.parse()?;
    tracing::info!("Starting dashboard-graphs service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
