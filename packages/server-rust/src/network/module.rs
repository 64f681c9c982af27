//! HTTP server with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the listener and
//! `serve()` accepts requests until shutdown. Callers can warm the schema
//! cache between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    find_handler, health_handler, liveness_handler, query_handler, readiness_handler,
    refresh_schema_handler, schema_handler, translate_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::QueryService;

/// Owns the listener and the state shared by every request.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    service: Arc<QueryService>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding a port.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<QueryService>) -> Self {
        Self {
            config,
            listener: None,
            service,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Routes:
    /// - `GET /health`, `GET /health/live`, `GET /health/ready`
    /// - `POST /schema`, `POST /schema/refresh`
    /// - `POST /find`
    /// - `POST /translate`, `POST /query`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/schema", post(schema_handler))
            .route("/schema/refresh", post(refresh_schema_handler))
            .route("/find", post(find_handler))
            .route("/translate", post(translate_handler))
            .route("/query", post(query_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the configured address and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let controller = Arc::clone(&self.shutdown);

        controller.set_ready();
        info!("serving HTTP");

        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                tokio::select! {
                    () = shutdown => {}
                    () = controller.wait_for_signal() => {}
                }
                controller.trigger_shutdown();
            }
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(in_flight = controller.in_flight_count(), "drain timeout expired");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::network::HealthState;
    use crate::service::ServerConfig;
    use crate::storage::StorePool;

    fn module() -> NetworkModule {
        let service = QueryService::new(ServerConfig::default(), Arc::new(StorePool::new()));
        NetworkModule::new(NetworkConfig::default(), Arc::new(service))
    }

    #[test]
    fn new_does_not_bind() {
        let module = module();
        assert!(module.listener.is_none());
        assert!(Arc::ptr_eq(&module.shutdown_controller(), &module.shutdown_controller()));
    }

    #[test]
    fn router_builds() {
        let _router = module().build_router();
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let mut module = module();
        module.config.host = "127.0.0.1".to_string();
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_fails() {
        let err = module().serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_controller_signal() {
        let mut module = module();
        module.config.host = "127.0.0.1".to_string();
        module.start().await.unwrap();
        let controller = module.shutdown_controller();

        let server = tokio::spawn(module.serve(std::future::pending::<()>()));
        while controller.health_state() != HealthState::Ready {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        controller.trigger_shutdown();
        server.await.unwrap().unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
