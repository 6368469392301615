use crate::infra::{AppState, PricingState};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use dynamic_pricing::error::AppError;
use dynamic_pricing::pricing::{HourOfDay, PricingResult, RawFactors, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const HOUR_FIELD: &str = "hour";

/// Raw `?hour=`; validated alongside the body hour so both fail the same way.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct HourQuery {
    #[serde(default)]
    pub(crate) hour: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuoteResponse {
    pub(crate) predicted_price: f64,
    pub(crate) hour: HourOfDay,
    pub(crate) table_version: String,
    pub(crate) change_pct: f64,
    #[serde(flatten)]
    pub(crate) result: PricingResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchRequest {
    pub(crate) records: Vec<RawFactors>,
    #[serde(default)]
    pub(crate) hour: Option<HourOfDay>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchResponse {
    pub(crate) hour: HourOfDay,
    pub(crate) table_version: String,
    pub(crate) priced: usize,
    pub(crate) failed: usize,
    pub(crate) results: Vec<BatchRow>,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct BatchRow {
    pub(crate) index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

pub(crate) fn pricing_router(state: PricingState) -> Router {
    Router::new()
        .route("/invocations", post(quote_endpoint))
        .route("/api/v1/pricing/quote", post(quote_endpoint))
        .route("/api/v1/pricing/batch", post(batch_endpoint))
        .with_state(state)
}

pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/ping", get(ping))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn ping() -> &'static str {
    "Successful Ping"
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Prices one record; `hour` may arrive in the query string or the body.
pub(crate) async fn quote_endpoint(
    State(state): State<PricingState>,
    Query(query): Query<HourQuery>,
    Json(mut record): Json<RawFactors>,
) -> Result<Json<QuoteResponse>, AppError> {
    let query_hour = match query.hour {
        Some(raw) => requested_hour(&Value::String(raw))?,
        None => None,
    };
    let body_hour = match record.remove(HOUR_FIELD) {
        Some(value) => requested_hour(&value)?,
        None => None,
    };
    let hour = state.clock.resolve(query_hour.or(body_hour));

    let result = state.engine.quote(&record, hour)?;
    tracing::debug!(
        hour = hour.get(),
        price = result.price,
        clamped = ?result.clamped,
        "quote priced"
    );

    Ok(Json(QuoteResponse {
        predicted_price: result.price,
        hour,
        table_version: state.engine.registry().version().to_string(),
        change_pct: result.change_pct(),
        result,
    }))
}

pub(crate) async fn batch_endpoint(
    State(state): State<PricingState>,
    Json(request): Json<BatchRequest>,
) -> Json<BatchResponse> {
    let hour = state.clock.resolve(request.hour);
    let outcome = state.engine.batch().evaluate(&request.records, hour);

    let priced = outcome.priced();
    let failed = outcome.failed();
    let results = outcome
        .into_results()
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(quote) => BatchRow {
                index,
                price: Some(quote.price),
                error: None,
            },
            Err(error) => BatchRow {
                index,
                price: None,
                error: Some(error.to_string()),
            },
        })
        .collect();

    Json(BatchResponse {
        hour,
        table_version: state.engine.registry().version().to_string(),
        priced,
        failed,
        results,
    })
}

fn requested_hour(value: &Value) -> Result<Option<HourOfDay>, ValidationError> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    let hour = raw
        .and_then(|hour| u32::try_from(hour).ok())
        .ok_or_else(|| ValidationError::NonNumeric {
            field: HOUR_FIELD,
            value: value.to_string(),
        })?;
    HourOfDay::new(hour).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ServiceClock;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use chrono::FixedOffset;
    use dynamic_pricing::pricing::PricingEngine;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> PricingState {
        let utc = FixedOffset::east_opt(0).expect("offset");
        PricingState::new(PricingEngine::standard(), ServiceClock::Fixed(utc))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds")
    }

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn invocations_returns_predicted_price() {
        let response = pricing_router(state())
            .oneshot(post_json(
                "/invocations",
                json!({ "BaseSellingPrice": 100, "hour": 10 }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["predicted_price"], json!(98.0));
        assert_eq!(payload["hour"], json!(10));
        assert_eq!(payload["table_version"], json!("standard-v1"));
        assert_eq!(payload["adjustments"].as_array().map(Vec::len), Some(19));
    }

    #[tokio::test]
    async fn query_hour_overrides_body_hour() {
        let response = pricing_router(state())
            .oneshot(post_json(
                "/api/v1/pricing/quote?hour=20",
                json!({ "BaseSellingPrice": 100, "hour": 10 }),
            ))
            .await
            .expect("route executes");

        let payload = read_json_body(response).await;
        assert_eq!(payload["predicted_price"], json!(102.0));
    }

    #[tokio::test]
    async fn invalid_base_price_is_a_bad_request() {
        let response = pricing_router(state())
            .oneshot(post_json(
                "/invocations",
                json!({ "BaseSellingPrice": -4, "hour": 12 }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json_body(response).await;
        assert!(payload["error"]
            .as_str()
            .is_some_and(|message| message.contains("BaseSellingPrice")));
    }

    #[tokio::test]
    async fn out_of_range_body_hour_is_rejected() {
        let response = pricing_router(state())
            .oneshot(post_json(
                "/invocations",
                json!({ "BaseSellingPrice": 10, "hour": "25" }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_query_hour_returns_json_error() {
        for uri in ["/invocations?hour=25", "/api/v1/pricing/quote?hour=noon"] {
            let response = pricing_router(state())
                .oneshot(post_json(uri, json!({ "BaseSellingPrice": 10 })))
                .await
                .expect("route executes");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let payload = read_json_body(response).await;
            assert!(
                payload["error"]
                    .as_str()
                    .is_some_and(|message| message.contains("hour")),
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn batch_reports_each_row() {
        let Json(body) = batch_endpoint(
            State(state()),
            Json(BatchRequest {
                records: vec![
                    json!({ "BaseSellingPrice": 100 })
                        .as_object()
                        .cloned()
                        .expect("object"),
                    json!({ "Temperature": 30 })
                        .as_object()
                        .cloned()
                        .expect("object"),
                ],
                hour: HourOfDay::new(13).ok(),
            }),
        )
        .await;

        assert_eq!(body.priced, 1);
        assert_eq!(body.failed, 1);
        assert_eq!(
            body.results[0],
            BatchRow {
                index: 0,
                price: Some(100.0),
                error: None,
            }
        );
        assert_eq!(
            body.results[1].error.as_deref(),
            Some("BaseSellingPrice is missing")
        );
    }

    #[tokio::test]
    async fn operational_routes_report_status() {
        let app_state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let router = with_operational_routes(pricing_router(state())).layer(Extension(app_state));

        let ping = router
            .clone()
            .oneshot(Request::get("/ping").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(ping.status(), StatusCode::OK);
        let body = axum::body::to_bytes(ping.into_body(), 1024)
            .await
            .expect("read body");
        assert_eq!(&body[..], b"Successful Ping");

        let ready = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
