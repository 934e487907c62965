use crate::cli::ServeArgs;
use crate::infra::{sample_candidate, AppState};
use crate::routes::with_ops_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use talent_gate::access::{Profile, ProfileRepository};
use talent_gate::config::AppConfig;
use talent_gate::error::AppError;
use talent_gate::{engine_router, telemetry, EngineContext};
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let context = Arc::new(EngineContext::in_memory(config.engine.clone()));
    if args.seed_sample {
        if let Err(err) = context
            .profiles
            .upsert(Profile::Candidate(sample_candidate()))
        {
            warn!(error = %err, "sample profile not loaded");
        }
    }

    let scheduler = context.scheduler.clone();
    let tick = Duration::from_secs(config.scheduler.tick_seconds);
    tokio::spawn(scheduler.run(tick));

    let app = with_ops_routes(engine_router(context))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        tick_seconds = config.scheduler.tick_seconds,
        "talent gate ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
