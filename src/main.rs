use std::sync::Arc;

use practice_mcp_server::{
    build_app,
    capability::Dispatcher,
    config::{Config, TransportKind},
    domain::build_registry,
    logging,
    mcp::transport,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let registry = build_registry(config.file_root.clone())?;
    let dispatcher = Arc::new(
        Dispatcher::new(Arc::new(registry)).with_handler_timeout(config.handler_timeout),
    );

    match config.transport {
        TransportKind::Stdio => {
            info!(file_root = %config.file_root.display(), "server starting on stdio");
            transport::serve(&mut transport::stdio(), &dispatcher).await?;
        }
        TransportKind::Http => {
            let bind_socket = config.bind_socket()?;
            let api_token = config.api_token.clone().unwrap_or_default();
            let app = build_app(AppState::new(api_token, dispatcher));
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting on http"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}
