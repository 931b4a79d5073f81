use crate::collector::Collector;
use crate::config::ExporterConfig;
use crate::error::Result;
use crate::metrics::sink::PrometheusSink;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Clone)]
struct AppState {
    collector: Arc<Collector>,
    /// Registered once at startup; cloned empty for every scrape.
    registered: PrometheusSink,
}

pub fn router(collector: Arc<Collector>) -> Result<Router> {
    let mut registered = PrometheusSink::new();
    collector.register(&mut registered)?;

    Ok(Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .with_state(AppState {
            collector,
            registered,
        }))
}

/// Every scrape runs its own cycle into its own sink.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut sink = state.registered.clone();
    state.collector.collect(&mut sink).await;

    match sink.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok\n"
}

pub async fn serve(config: &ExporterConfig, collector: Arc<Collector>) -> Result<()> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    log::info!(
        "Listening on {}, polling {}",
        listener.local_addr()?,
        collector.endpoint()
    );

    run(listener, collector, shutdown_signal(), config.shutdown_timeout()).await
}

/// Serves until `shutdown` resolves, then gives in-flight scrapes `grace` to finish.
pub async fn run<F>(
    listener: TcpListener,
    collector: Arc<Collector>,
    shutdown: F,
    grace: Duration,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router(collector)?)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = stop_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let deadline = async move {
        match stop_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = &mut server => res?,
        _ = deadline => log::warn!("Graceful shutdown timed out after {:?}", grace),
    }

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    log::info!("Shutting down...");
}
