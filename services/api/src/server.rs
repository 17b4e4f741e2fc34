use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryProgramCatalog};
use crate::routes::with_recommendation_routes;
use admit_guide::config::AppConfig;
use admit_guide::eligibility::EligibilityEngine;
use admit_guide::error::AppError;
use admit_guide::recommendations::{ProgramCatalog, RecommendationError, RecommendationService};
use admit_guide::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let engine = EligibilityEngine::new(config.engine.clone()).map_err(|err| {
        error!(problems = ?err.problems, "engine configuration rejected");
        err
    })?;

    let catalog = Arc::new(InMemoryProgramCatalog::load(args.catalog.as_deref())?);
    let program_count = catalog
        .programs()
        .map_err(RecommendationError::from)?
        .len();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(RecommendationService::new(
        catalog,
        engine,
        config.cache,
        config.rate_limit,
    ));

    let app = with_recommendation_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, programs = program_count, "admission guidance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
