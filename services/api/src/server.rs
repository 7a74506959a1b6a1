use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use tracing::info;

use crate::cli::ServeArgs;
use crate::demo::{current_school_year, demo_catalog, seed_demo_data};
use crate::infra::{
    AppState, InMemoryGradeStore, InMemoryHonorResultStore, InMemoryRoster,
    LoggingNotificationGateway,
};
use crate::routes::with_honors_routes;
use honors_engine::config::AppConfig;
use honors_engine::error::AppError;
use honors_engine::honors::{ApprovalService, HonorRollService, HonorsState};
use honors_engine::telemetry;

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

    let catalog = Arc::new(demo_catalog());
    let roster = Arc::new(InMemoryRoster::default());
    let grades = Arc::new(InMemoryGradeStore::default());
    let results = Arc::new(InMemoryHonorResultStore::default());
    if args.seed_demo {
        let school_year = current_school_year(Local::now().date_naive());
        seed_demo_data(&roster, &grades, &school_year);
        info!(%school_year, "seeded demo roster and grades");
    }

    let generator = Arc::new(HonorRollService::new(
        catalog.clone(),
        roster,
        grades,
        results.clone(),
        Arc::new(LoggingNotificationGateway::default()),
        config.engine.engine_policy(),
    ));
    let approvals = Arc::new(ApprovalService::new(
        catalog,
        results.clone(),
        config.engine.override_policy(),
    ));

    let app = with_honors_routes(HonorsState {
        generator,
        approvals,
        results,
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "honor qualification engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
