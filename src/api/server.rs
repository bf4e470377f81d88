use crate::api::routes;
use crate::core::WorkflowManager;
use crate::health::HealthHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Starts and runs the HTTP server using Axum web framework
///
/// # Arguments
/// * `port` - Port number to listen on for incoming HTTP connections
/// * `manager` - Workflow manager the handlers delegate to
/// * `health` - Read handle on the backend health snapshots
pub async fn launch_server(
    port: u16,
    manager: Arc<WorkflowManager>,
    health: HealthHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = routes::app(manager, health);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
