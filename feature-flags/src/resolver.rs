use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::api::FlipError;
use crate::engine::{FeatureMap, FlagEngine, UserContext};
use crate::overrides::OverrideMapping;

static NO_FEATURES: FeatureMap = FeatureMap::new();

/// The feature set of a single request: the engine's answer for the request's user, with the
/// client's overrides layered on top.
///
/// The resolved set is computed on first access after [`set_for_user`] and cached until the
/// next call to it. Nothing here is shared between requests.
///
/// [`set_for_user`]: RequestFeatureResolver::set_for_user
pub struct RequestFeatureResolver {
    engine: Arc<dyn FlagEngine>,
    overrides: OverrideMapping,
    user: Option<UserContext>,
    resolved: OnceCell<FeatureMap>,
}

impl RequestFeatureResolver {
    pub fn new(engine: Arc<dyn FlagEngine>, overrides: OverrideMapping) -> Self {
        RequestFeatureResolver {
            engine,
            overrides,
            user: None,
            resolved: OnceCell::new(),
        }
    }

    /// Sets the user to evaluate for. Calling it again discards the previous result.
    pub fn set_for_user(&mut self, user: UserContext) {
        self.user = Some(user);
        self.resolved = OnceCell::new();
    }

    pub fn user(&self) -> Option<&UserContext> {
        self.user.as_ref()
    }

    pub fn overrides(&self) -> &OverrideMapping {
        &self.overrides
    }

    /// The resolved feature set, empty until a user has been set.
    pub fn features(&self) -> &FeatureMap {
        match &self.user {
            Some(user) => self.resolved.get_or_init(|| self.resolve(user)),
            None => &NO_FEATURES,
        }
    }

    /// Whether `flag_id` is enabled for this request. Unknown flags are disabled.
    ///
    /// Fails with [`FlipError::UserNotSet`] when asked before [`set_for_user`], rather than
    /// silently answering for an anonymous user.
    ///
    /// [`set_for_user`]: RequestFeatureResolver::set_for_user
    pub fn has(&self, flag_id: &str) -> Result<bool, FlipError> {
        if self.user.is_none() {
            return Err(FlipError::UserNotSet);
        }
        Ok(self.features().get(flag_id).copied().unwrap_or(false))
    }

    fn resolve(&self, user: &UserContext) -> FeatureMap {
        let mut features = self.engine.evaluate(user);
        for (flag_id, enabled) in &self.overrides {
            features.insert(flag_id.clone(), *enabled);
        }
        tracing::debug!(
            flags = features.len(),
            overrides = self.overrides.len(),
            "resolved request features"
        );
        features
    }
}

/// Handle to the request's resolver, stored in the request extensions by the middleware.
/// Clones share the same resolver.
#[derive(Clone)]
pub struct RequestFeatures(Arc<RwLock<RequestFeatureResolver>>);

impl RequestFeatures {
    pub fn new(resolver: RequestFeatureResolver) -> Self {
        RequestFeatures(Arc::new(RwLock::new(resolver)))
    }

    pub fn set_for_user(&self, user: UserContext) {
        self.0.write().set_for_user(user);
    }

    pub fn has(&self, flag_id: &str) -> Result<bool, FlipError> {
        self.0.read().has(flag_id)
    }

    pub fn features(&self) -> FeatureMap {
        self.0.read().features().clone()
    }

    pub fn overrides(&self) -> OverrideMapping {
        self.0.read().overrides().clone()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestFeatures
where
    S: Send + Sync,
{
    type Rejection = FlipError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestFeatures>()
            .cloned()
            .ok_or(FlipError::ContextMissing)
    }
}
