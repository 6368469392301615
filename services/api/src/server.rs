use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState, PricingState, ServiceClock};
use crate::routes::{pricing_router, with_operational_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use dynamic_pricing::config::AppConfig;
use dynamic_pricing::error::AppError;
use dynamic_pricing::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let engine = build_engine(&config.pricing)?;
    let clock = ServiceClock::from_config(&config.pricing);
    let settings = engine.settings();
    info!(
        tables = engine.registry().version(),
        min_adjustment = settings.bounds.min_adjustment(),
        max_adjustment = settings.bounds.max_adjustment(),
        case_insensitive = settings.case_insensitive,
        ?clock,
        "pricing engine configured"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_operational_routes(pricing_router(PricingState::new(engine, clock)))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "dynamic pricing service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
