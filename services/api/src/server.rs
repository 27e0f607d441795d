use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryNotificationPublisher};
use crate::routes::with_roster_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use clubroll::config::AppConfig;
use clubroll::error::AppError;
use clubroll::roster::{InMemoryRosterStore, RosterServices};
use clubroll::telemetry;
use std::sync::atomic::Ordering;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = Arc::new(RosterServices::new(
        Arc::new(InMemoryRosterStore::default()),
        Arc::new(InMemoryNotificationPublisher::default()),
        config.allocation,
    ));

    let app = with_roster_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        reference_month = config.allocation.month(),
        reference_day = config.allocation.day(),
        "club roster service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
