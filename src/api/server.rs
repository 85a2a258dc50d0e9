use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::pipeline::Pipeline;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: Arc<Pipeline>,
}

pub struct ApiServer {
    ctx: AppContext,
}

impl ApiServer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            ctx: AppContext { pipeline },
        }
    }

    /// Bind and serve until the cancellation token fires, then finish
    /// in-flight requests and return.
    pub async fn serve(self, listen: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = super::handlers::router(self.ctx);
        let listener = TcpListener::bind(listen).await?;
        info!(addr = %listener.local_addr()?, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
