use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::flag_definitions::FlagRegistry;
use crate::metrics::setup_metrics_recorder;
use crate::render::JsonRender;
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = FlagRegistry::from(&config.flags);
    tracing::info!(
        flags = registry.len(),
        cookie_name = %config.cookie_name,
        manual_route_path = %config.manual_route_path,
        "loaded flag registry"
    );

    // Don't install metrics unless asked to
    // Global metrics recorders can play poorly with e.g. tests
    let metrics = if config.enable_metrics {
        match setup_metrics_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to install metrics recorder: {}", e);
                return;
            }
        }
    } else {
        None
    };

    let app = router::router(Arc::new(registry), Arc::new(JsonRender), &config, metrics);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("could not read listener address: {}", e),
    }

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    {
        tracing::error!("server error: {}", e);
    }
}
