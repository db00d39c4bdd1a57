use drbot::{build_router, AnalysisQueue, AppState, ChatService, Config};

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    init_logging();

    info!("Starting DR BOT service v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            info!("  +- Image base directory: {}", config.image_base_dir);
            info!("  +--------- Groq API URL: {}", config.groq_api_url);
            info!("  +----------- Groq model: {}", config.groq_model);
            info!("  +----------- Queue size: {}", config.queue_size);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize services: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Analysis queue initialized with size: {}",
        config.queue_size
    );

    spawn_session_pruning(state.chat.clone(), config.session_ttl());

    let queue = state.queue.clone();
    let app = build_router(state);

    let addr = match SocketAddr::from_str(&config.server_address()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address {}: {}", config.server_address(), e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server bound to {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(queue))
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("DR BOT service stopped");
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drbot=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn spawn_session_pruning(chat: ChatService, ttl: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            chat.prune_idle(ttl).await;
        }
    });
}

async fn shutdown_signal(queue: AnalysisQueue) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    info!("Shutting down analysis queue...");
    queue.shutdown().await;

    warn!("Waiting 10 seconds for in-flight requests to complete...");
    tokio::time::sleep(Duration::from_secs(10)).await;

    info!("Graceful shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config::from_vars(vec![
            ("GROQ_API_KEY".to_string(), "gsk_test".to_string()),
            (
                "GROQ_API_URL".to_string(),
                "http://127.0.0.1:9/openai/v1/chat/completions".to_string(),
            ),
            ("IMAGE_BASE_DIR".to_string(), "/tmp".to_string()),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_check_route() {
        let app = build_router(AppState::new(&test_config()).unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_404_handler() {
        let app = build_router(AppState::new(&test_config()).unwrap());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
