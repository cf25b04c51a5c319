//! Routes and handlers of the usage statistics API.

use crate::aggregate::{Aggregation, TopRegions, UsageTrends};
use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::dataset::{Dataset, RawRow};
use crate::error::UsageError;
use crate::metrics;
use crate::models;
use crate::validated_query::ValidatedQuery;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower::Layer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{event, Level};

/// Service that serves the API
pub type Service = NormalizePath<Router>;

/// Returns a [axum::Router] for the API
///
/// The router is populated with all routes as well as the following middleware:
///
/// * a [tower_http::trace::TraceLayer] for tracing requests and responses, feeding the
///   request and response metrics
/// * a [tower_http::cors::CorsLayer] allowing `GET` requests from any origin
///
/// # Arguments
///
/// * `state`: Shared application state
fn router(state: SharedAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    fn api() -> Router<SharedAppState> {
        Router::new()
            .route("/health", get(health_check))
            .route("/raw-data", get(raw_data))
            .route("/top-regions", get(top_regions))
            .route("/usage-trends", get(usage_trends))
    }

    Router::new()
        .route("/", get(root))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                )
                .layer(cors),
        )
        .with_state(state)
}

/// Returns a [crate::app::Service] serving the API over a loaded dataset
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `dataset`: The loaded dataset
pub fn service(args: &CommandLineArgs, dataset: Dataset) -> Service {
    let state = Arc::new(AppState::new(args, dataset));
    let router = router(state);

    // Axum doesn't trim trailing slashes at the router level, so wrap the whole router.
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Run an aggregation over the whole dataset.
///
/// The aggregation runs either on the Tokio worker or, with `--use-rayon`, on the Rayon thread
/// pool so that large tables do not stall the executor.
async fn aggregate<A>(state: SharedAppState, aggregation: A) -> Vec<A::Output>
where
    A: Aggregation + Send + 'static,
{
    let use_rayon = state.args.use_rayon;
    let run = move || {
        let _timer = metrics::aggregation_timer(A::KIND);
        let result = aggregation.execute(state.dataset.records());
        event!(Level::DEBUG, "{} produced {} rows", A::KIND, result.len());
        result
    };
    if use_rayon {
        tokio_rayon::spawn(run).await
    } else {
        run()
    }
}

/// Handler for `/`
async fn root() -> Json<models::Welcome> {
    Json(models::Welcome {
        message: models::WELCOME_MESSAGE.to_string(),
    })
}

/// Handler for `/api/health`
async fn health_check(State(state): State<SharedAppState>) -> Json<models::Health> {
    Json(models::Health {
        status: models::HEALTH_STATUS.to_string(),
        message: models::HEALTH_MESSAGE.to_string(),
        data_loaded: state.dataset.len(),
        columns: state.dataset.columns().to_vec(),
    })
}

/// Handler for `/api/raw-data`
///
/// Rows borrow from the shared dataset, so they are serialised here rather than through [Json].
async fn raw_data(State(state): State<SharedAppState>) -> Result<Response, UsageError> {
    let rows: Vec<RawRow> = state.dataset.raw_rows();
    let body = serde_json::to_vec(&rows)?;
    Ok((
        [(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())],
        body,
    )
        .into_response())
}

/// Handler for `/api/top-regions`
async fn top_regions(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<models::TopRegionsQuery>,
) -> Json<Vec<models::RegionTotal>> {
    let limit = query.limit.unwrap_or(state.args.top_regions_limit);
    Json(aggregate(state, TopRegions { limit }).await)
}

/// Handler for `/api/usage-trends`
async fn usage_trends(
    State(state): State<SharedAppState>,
    ValidatedQuery(query): ValidatedQuery<models::UsageTrendsQuery>,
) -> Json<Vec<models::UsageTrend>> {
    let trends = UsageTrends {
        regions: query.region_filter(),
    };
    Json(aggregate(state, trends).await)
}

/// Fallback handler for paths with no route
async fn not_found(uri: Uri) -> UsageError {
    UsageError::NotFound {
        path: uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use clap::Parser;
    use regex::Regex;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt; // for `oneshot`

    fn test_args(extra: &[&str]) -> CommandLineArgs {
        let mut argv = vec!["usagestat"];
        argv.extend_from_slice(extra);
        CommandLineArgs::parse_from(argv)
    }

    // Send a GET request to a service over the sample dataset.
    async fn get_with(args: &CommandLineArgs, uri: &str) -> Response {
        service(args, test_utils::sample_dataset())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get(uri: &str) -> Response {
        get_with(&test_args(&[]), uri).await
    }

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn body_json<T: DeserializeOwned>(response: Response) -> T {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn root() {
        let response = get("/").await;
        assert_eq!(StatusCode::OK, response.status());
        let welcome: models::Welcome = body_json(response).await;
        assert_eq!("Welcome to the Azure Demand Forecasting API!", welcome.message);
    }

    #[tokio::test]
    async fn health() {
        let response = get("/api/health").await;
        assert_eq!(StatusCode::OK, response.status());
        let health: models::Health = body_json(response).await;
        assert_eq!(
            models::Health {
                status: "healthy".to_string(),
                message: "Azure Demand Forecasting API is running".to_string(),
                data_loaded: 3,
                columns: vec![
                    "date".to_string(),
                    "region".to_string(),
                    "usage_cpu".to_string(),
                    "usage_storage".to_string(),
                    "holiday".to_string(),
                ],
            },
            health
        );
    }

    #[tokio::test]
    async fn usage_trends() {
        let response = get("/api/usage-trends").await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            r#"[{"date":"2024-01-01T00:00:00","region":"eastus","usage_cpu":15.0},{"date":"2024-01-02T00:00:00","region":"westus","usage_cpu":5.0}]"#,
            body_string(response).await
        );
    }

    #[tokio::test]
    async fn usage_trends_with_rayon() {
        let response = get_with(&test_args(&["--use-rayon"]), "/api/usage-trends").await;
        assert_eq!(StatusCode::OK, response.status());
        let trends: Vec<models::UsageTrend> = body_json(response).await;
        assert_eq!(2, trends.len());
        assert_eq!(15.0, trends[0].usage_cpu);
    }

    #[tokio::test]
    async fn usage_trends_region_filter() {
        let response = get("/api/usage-trends?regions=westus").await;
        assert_eq!(StatusCode::OK, response.status());
        let trends: Vec<models::UsageTrend> = body_json(response).await;
        assert_eq!(1, trends.len());
        assert_eq!("westus", trends[0].region);
    }

    #[tokio::test]
    async fn usage_trends_blank_region_filter() {
        let response = get("/api/usage-trends?regions=,").await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let body = body_string(response).await;
        let re = Regex::new(r".*regions must name at least one region.*").unwrap();
        assert!(re.is_match(&body[..]), "body: {body}");
    }

    #[tokio::test]
    async fn top_regions() {
        let response = get("/api/top-regions").await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            r#"[{"region":"eastus","total_cpu_usage":30.0},{"region":"westus","total_cpu_usage":5.0}]"#,
            body_string(response).await
        );
    }

    #[tokio::test]
    async fn top_regions_with_rayon() {
        let response = get_with(&test_args(&["--use-rayon"]), "/api/top-regions").await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            r#"[{"region":"eastus","total_cpu_usage":30.0},{"region":"westus","total_cpu_usage":5.0}]"#,
            body_string(response).await
        );
    }

    #[tokio::test]
    async fn top_regions_limit() {
        let response = get("/api/top-regions?limit=1").await;
        assert_eq!(StatusCode::OK, response.status());
        let totals: Vec<models::RegionTotal> = body_json(response).await;
        assert_eq!(1, totals.len());
        assert_eq!("eastus", totals[0].region);
    }

    #[tokio::test]
    async fn top_regions_default_limit_from_args() {
        let response = get_with(&test_args(&["--top-regions-limit", "1"]), "/api/top-regions").await;
        let totals: Vec<models::RegionTotal> = body_json(response).await;
        assert_eq!(1, totals.len());
    }

    #[tokio::test]
    async fn top_regions_invalid_limit() {
        let response = get("/api/top-regions?limit=0").await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let body = body_string(response).await;
        let re = Regex::new(r".*limit must be between 1 and 1000.*").unwrap();
        assert!(re.is_match(&body[..]), "body: {body}");
    }

    #[tokio::test]
    async fn top_regions_non_numeric_limit() {
        let response = get("/api/top-regions?limit=five").await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[tokio::test]
    async fn raw_data() {
        let response = get("/api/raw-data").await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(
            "application/json",
            response.headers()[header::CONTENT_TYPE]
        );
        let rows: Vec<serde_json::Value> = body_json(response).await;
        assert_eq!(3, rows.len());
        assert_eq!(
            serde_json::json!({
                "date": "2024-01-01T00:00:00",
                "region": "eastus",
                "usage_cpu": 20.0,
                "usage_storage": 1300,
                "holiday": 0,
            }),
            rows[1]
        );
    }

    #[tokio::test]
    async fn trailing_slash() {
        let response = get("/api/health/").await;
        assert_eq!(StatusCode::OK, response.status());
    }

    #[tokio::test]
    async fn not_found() {
        let response = get("/api/nope/nope").await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn unknown_root_path() {
        let response = get("/forecast").await;
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        let body = body_string(response).await;
        let re = Regex::new(r".*no route for /forecast.*").unwrap();
        assert!(re.is_match(&body[..]), "body: {body}");
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let response = service(&test_args(&[]), test_utils::sample_dataset())
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!("*", response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN]);
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        // Registration fails harmlessly if another test got there first.
        let _ = metrics::register_metrics();
        let response = get("/metrics").await;
        assert_eq!(StatusCode::OK, response.status());
        let body = body_string(response).await;
        assert!(body.contains("dataset_records"), "body: {body}");
    }

    #[tokio::test]
    async fn empty_dataset() {
        let dataset = Dataset::from_reader("date,region,usage_cpu\n".as_bytes()).unwrap();
        let response = service(&test_args(&[]), dataset)
            .oneshot(
                Request::builder()
                    .uri("/api/top-regions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!("[]", body_string(response).await);
    }
}
