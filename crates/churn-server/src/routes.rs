use crate::view::IndexPage;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use churn_core::{
    error::ScoreError,
    pipeline::AppCore,
    schema::{CustomerForm, ErrorResponse, ScoreResponse},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub prom: PrometheusHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/api/score", post(api_score))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn render(page: IndexPage<'_>) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            metrics::counter!("render_error_total").increment(1);
            tracing::error!(err = %e, "render index.html failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

async fn index() -> Response {
    render(IndexPage::empty())
}

/// 表单提交：成功/失败都回到同一个页面
async fn predict(State(st): State<AppState>, Form(form): Form<CustomerForm>) -> Response {
    match st.core.score(&form) {
        Ok(scored) => render(IndexPage::scored(&scored)),
        Err(e) => render(IndexPage::failed(&e, &form)),
    }
}

fn error_status(e: &ScoreError) -> StatusCode {
    if e.is_input_error() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    match e {
        ScoreError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn api_score(
    State(st): State<AppState>,
    Json(obj): Json<Map<String, Value>>,
) -> Result<Json<ScoreResponse>, (StatusCode, Json<ErrorResponse>)> {
    let form = CustomerForm::from_json(&obj);
    match st.core.score(&form) {
        Ok(scored) => Ok(Json(ScoreResponse::from_scored(Uuid::new_v4(), scored))),
        Err(e) => Err((error_status(&e), Json(ErrorResponse::from(&e)))),
    }
}

async fn health(State(st): State<AppState>) -> &'static str {
    if st.core.is_ready() {
        "ok"
    } else {
        "degraded"
    }
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use churn_core::{config::Config, model::LogisticModel};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    const FORM_BODY: &str = "total_logins=5&tickets_raised=2&customer_tenure=12&sentiment_score=0.4\
        &onboarding_year=2019&loans_accessed=1&loans_taken=0&monthly_avg_balance=500";

    fn app(core: AppCore) -> Router {
        let prom = PrometheusBuilder::new().build_recorder().handle();
        router(AppState {
            core: Arc::new(core),
            prom,
        })
    }

    /// 常数模型：p_churn = 0.82
    fn ready_app() -> Router {
        let clf = LogisticModel {
            intercept: (0.82f64 / 0.18).ln(),
            coefficients: vec![0.0; 8],
            threshold: 0.5,
        };
        app(AppCore::with_classifier(Config::default(), Arc::new(clf)))
    }

    fn degraded_app() -> Router {
        app(AppCore::new(Config::default()))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/score")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn index_renders_all_inputs() {
        let (status, body) = send(ready_app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        for name in churn_core::schema::FEATURE_NAMES {
            assert!(body.contains(&format!(r#"name="{name}""#)), "missing input {name}");
        }
        assert!(!body.contains("class=\"result\""));
    }

    #[tokio::test]
    async fn form_submit_shows_result_and_echoes_input() {
        let (status, body) = send(ready_app(), form_post(FORM_BODY)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Will Churn"), "{body}");
        assert!(body.contains("82.00%"), "{body}");
        assert!(body.contains("High Risk"), "{body}");
        assert!(body.contains("color: red"), "{body}");
        assert!(body.contains(r#"value="0.4""#), "{body}");
    }

    #[tokio::test]
    async fn form_missing_field_shows_error() {
        let body = FORM_BODY.replace("&sentiment_score=0.4", "");
        let (status, body) = send(ready_app(), form_post(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("missing field: sentiment_score"), "{body}");
        assert!(!body.contains("class=\"result\""));
    }

    #[tokio::test]
    async fn form_without_model_shows_static_message() {
        let (status, body) = send(degraded_app(), form_post(FORM_BODY)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            body.contains("Model not loaded. Please contact administrator."),
            "{body}"
        );
    }

    #[tokio::test]
    async fn api_score_returns_result_fields() {
        let req = json_post(serde_json::json!({
            "total_logins": 5,
            "tickets_raised": 2,
            "customer_tenure": 12,
            "sentiment_score": 0.4,
            "onboarding_year": 2019,
            "loans_accessed": 1,
            "loans_taken": 0,
            "monthly_avg_balance": 500
        }));
        let (status, body) = send(ready_app(), req).await;
        assert_eq!(status, StatusCode::OK);

        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["prediction"], "Will Churn");
        assert_eq!(v["probability"], 82.0);
        assert_eq!(v["risk_level"], "High Risk");
        assert_eq!(v["risk_color"], "red");
        assert_eq!(v["will_churn"], true);
        assert_eq!(v["input"]["onboarding_year"], "2019");
    }

    #[tokio::test]
    async fn api_score_distinguishes_error_kinds() {
        let bad = serde_json::json!({ "total_logins": "abc" });

        let (status, body) = send(ready_app(), json_post(bad.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["kind"], "invalid_number");

        let (status, body) = send(degraded_app(), json_post(bad)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["kind"], "model_unavailable");
        assert_eq!(v["error"], "Model not loaded. Please contact administrator.");
    }

    #[test]
    fn error_status_splits_caller_and_server_faults() {
        assert_eq!(
            error_status(&ScoreError::MissingField("loans_taken")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_status(&ScoreError::InvalidNumber {
                field: "total_logins",
                value: "abc".into(),
                reason: "invalid float literal".into(),
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_status(&ScoreError::ModelUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&ScoreError::PredictionFailure("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn health_reports_degraded_state() {
        assert_eq!(send(ready_app(), get("/health")).await.1, "ok");
        assert_eq!(send(degraded_app(), get("/health")).await.1, "degraded");
    }

    #[tokio::test]
    async fn metrics_endpoint_answers() {
        let (status, _) = send(ready_app(), get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
