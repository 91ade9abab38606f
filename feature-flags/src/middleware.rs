use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;

use crate::integration::FeatureFlip;
use crate::overrides::{self, OverrideMapping};
use crate::render::FeatureRender;
use crate::resolver::{RequestFeatureResolver, RequestFeatures};

/// Cookies decoded from the request, present only when cookie support is installed.
#[derive(Clone, Debug, Default)]
pub struct RequestCookies(pub CookieJar);

impl RequestCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|cookie| cookie.value())
    }

    /// The override mapping stored under `name`, empty if missing or malformed.
    pub fn overrides(&self, name: &str) -> OverrideMapping {
        self.get(name).map(overrides::decode).unwrap_or_default()
    }
}

/// Decodes the `Cookie` header into a [`RequestCookies`] extension.
pub async fn cookie_parser(mut request: Request<Body>, next: Next) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    request.extensions_mut().insert(RequestCookies(jar));
    next.run(request).await
}

/// Attaches the request's [`RequestFeatures`] and a [`FeatureRender`] bound to them, then
/// hands over to the rest of the stack.
pub async fn feature_context(
    State(flip): State<FeatureFlip>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookie_name = &flip.options().cookie_name;
    let overrides = request
        .extensions()
        .get::<RequestCookies>()
        .map(|cookies| cookies.overrides(cookie_name))
        .unwrap_or_default();

    let features = RequestFeatures::new(RequestFeatureResolver::new(flip.engine(), overrides));
    let render = FeatureRender::new(flip.renderer(), features.clone());

    let extensions = request.extensions_mut();
    extensions.insert(features);
    extensions.insert(render);

    next.run(request).await
}
