use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::{json, Map, Value};

use crate::api::FlipError;
use crate::resolver::RequestFeatures;

pub type TemplateData = Map<String, Value>;

pub const FEATURES_KEY: &str = "Features";
pub const FEATURES_JSON_KEY: &str = "FeaturesJSON";

/// The host's view rendering capability.
pub trait ViewRender: Send + Sync {
    fn render(&self, view: &str, data: Option<TemplateData>) -> Result<String, FlipError>;
}

/// Renders the view name and its data as a JSON document. Stands in for a template engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRender;

impl ViewRender for JsonRender {
    fn render(&self, view: &str, data: Option<TemplateData>) -> Result<String, FlipError> {
        let document = json!({
            "view": view,
            "data": Value::Object(data.unwrap_or_default()),
        });
        serde_json::to_string(&document).map_err(|e| FlipError::Render(e.to_string()))
    }
}

/// Wraps a renderer so every view receives the request's resolved features under
/// `Features`, and their serialized form under `FeaturesJSON`.
#[derive(Clone)]
pub struct FeatureRender {
    inner: Arc<dyn ViewRender>,
    features: RequestFeatures,
}

impl FeatureRender {
    pub fn new(inner: Arc<dyn ViewRender>, features: RequestFeatures) -> Self {
        FeatureRender { inner, features }
    }

    fn with_features(&self, data: Option<TemplateData>) -> Result<TemplateData, FlipError> {
        let features = self.features.features();
        let features_json =
            serde_json::to_string(&features).map_err(|e| FlipError::Render(e.to_string()))?;
        let features =
            serde_json::to_value(features).map_err(|e| FlipError::Render(e.to_string()))?;

        let mut data = data.unwrap_or_default();
        data.insert(FEATURES_KEY.to_string(), features);
        data.insert(FEATURES_JSON_KEY.to_string(), Value::String(features_json));
        Ok(data)
    }
}

impl ViewRender for FeatureRender {
    fn render(&self, view: &str, data: Option<TemplateData>) -> Result<String, FlipError> {
        let data = self.with_features(data)?;
        self.inner.render(view, Some(data))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for FeatureRender
where
    S: Send + Sync,
{
    type Rejection = FlipError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<FeatureRender>()
            .cloned()
            .ok_or(FlipError::ContextMissing)
    }
}
