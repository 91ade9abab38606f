use std::future::ready;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{header, HeaderValue},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::api::FlipError;
use crate::config::Config;
use crate::engine::{FlagEngine, UserContext};
use crate::integration::FeatureFlip;
use crate::metrics::track_metrics;
use crate::middleware::cookie_parser;
use crate::render::{FeatureRender, TemplateData, ViewRender};
use crate::resolver::RequestFeatures;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub distinct_id: Option<String>,
}

impl UserQuery {
    /// Requests without a `distinct_id` are evaluated for the anonymous user.
    pub fn user_context(&self) -> UserContext {
        match &self.distinct_id {
            Some(distinct_id) => UserContext::new(json!({ "distinct_id": distinct_id })),
            None => UserContext::anonymous(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureStatus {
    pub feature: String,
    pub enabled: bool,
}

/// Renders the `index` view for the anonymous user.
pub async fn index(
    features: RequestFeatures,
    render: FeatureRender,
) -> Result<Response, FlipError> {
    features.set_for_user(UserContext::anonymous());
    Ok(json_view(render.render("index", None)?))
}

pub async fn liveness() -> &'static str {
    "ok"
}

/// Renders the `features` view for the requesting user.
pub async fn features_view(
    features: RequestFeatures,
    render: FeatureRender,
    Query(query): Query<UserQuery>,
) -> Result<Response, FlipError> {
    features.set_for_user(query.user_context());

    let mut data = TemplateData::new();
    if let Some(distinct_id) = query.distinct_id {
        data.insert("distinct_id".to_string(), json!(distinct_id));
    }
    Ok(json_view(render.render("features", Some(data))?))
}

fn json_view(body: String) -> Response {
    let mut response = body.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

pub async fn feature_status(
    features: RequestFeatures,
    Path(feature): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<FeatureStatus>, FlipError> {
    features.set_for_user(query.user_context());
    let enabled = features.has(&feature)?;
    Ok(Json(FeatureStatus { feature, enabled }))
}

pub fn router(
    engine: Arc<dyn FlagEngine>,
    renderer: Arc<dyn ViewRender>,
    config: &Config,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let flip = FeatureFlip::new(engine, renderer, config.override_options());

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(liveness));

    let features_router = Router::new()
        .route("/features", get(features_view))
        .route("/features/:feature", get(feature_status));

    let router = flip.connect_all(Router::new().merge(status_router).merge(features_router));

    // Cookie support is a transport concern: without it the manual route refuses to work
    // and requests resolve without overrides.
    let router = if *config.cookies_enabled {
        router.layer(middleware::from_fn(cookie_parser))
    } else {
        router
    };

    let router = router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_metrics));

    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{FlexBool, DEFAULT_TEST_CONFIG};
    use crate::render::JsonRender;
    use crate::test_utils::fixture_registry;

    fn app(config: &Config) -> Router {
        router(
            Arc::new(fixture_registry()),
            Arc::new(JsonRender),
            config,
            None,
        )
    }

    async fn get_with_cookie(app: Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_index_sees_feature_context() {
        let response = get_with_cookie(
            app(&DEFAULT_TEST_CONFIG),
            "/",
            Some(r#"fflip=j:{"fClosed":true}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["view"], json!("index"));
        assert_eq!(body["data"]["Features"]["fClosed"], json!(true));
        assert_eq!(body["data"]["Features"]["fOpen"], json!(true));
        assert_eq!(body["data"]["Features"]["fEval"], json!(false));
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = get_with_cookie(app(&DEFAULT_TEST_CONFIG), "/_liveness", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_features_view_injects_features() {
        let response = get_with_cookie(
            app(&DEFAULT_TEST_CONFIG),
            "/features?distinct_id=xyz",
            Some(r#"fflip=j:{"fClosed":true}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["view"], json!("features"));
        assert_eq!(body["data"]["distinct_id"], json!("xyz"));
        assert_eq!(body["data"]["Features"]["fClosed"], json!(true));
        assert_eq!(body["data"]["Features"]["fOpen"], json!(true));
        assert_eq!(body["data"]["Features"]["fEval"], json!(false));

        let features_json: Value =
            serde_json::from_str(body["data"]["FeaturesJSON"].as_str().unwrap()).unwrap();
        assert_eq!(features_json, body["data"]["Features"]);
    }

    #[tokio::test]
    async fn test_feature_status_applies_overrides() {
        let response = get_with_cookie(
            app(&DEFAULT_TEST_CONFIG),
            "/features/fOpen",
            Some(r#"fflip=j:{"fOpen":false}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"feature": "fOpen", "enabled": false})
        );
    }

    #[tokio::test]
    async fn test_malformed_cookie_means_no_overrides() {
        let response = get_with_cookie(
            app(&DEFAULT_TEST_CONFIG),
            "/features/fOpen",
            Some("fflip=garbage"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"feature": "fOpen", "enabled": true})
        );
    }

    #[tokio::test]
    async fn test_cookies_disabled() {
        let mut config = DEFAULT_TEST_CONFIG.clone();
        config.cookies_enabled = FlexBool(false);

        let response = get_with_cookie(
            app(&config),
            "/features/fOpen",
            Some(r#"fflip=j:{"fOpen":false}"#),
        )
        .await;
        assert_eq!(
            body_json(response).await,
            json!({"feature": "fOpen", "enabled": true})
        );

        let response = get_with_cookie(app(&config), "/fflip/fOpen/1", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
