use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::config::OverrideOptions;
use crate::engine::FlagEngine;
use crate::manual_route::manual_route;
use crate::middleware::feature_context;
use crate::render::ViewRender;

/// Binds a flag engine to an axum application: per request feature resolution, render
/// augmentation, and the manual override route.
#[derive(Clone)]
pub struct FeatureFlip {
    engine: Arc<dyn FlagEngine>,
    renderer: Arc<dyn ViewRender>,
    options: Arc<OverrideOptions>,
}

impl FeatureFlip {
    pub fn new(
        engine: Arc<dyn FlagEngine>,
        renderer: Arc<dyn ViewRender>,
        options: OverrideOptions,
    ) -> Self {
        FeatureFlip {
            engine,
            renderer,
            options: Arc::new(options),
        }
    }

    pub fn engine(&self) -> Arc<dyn FlagEngine> {
        self.engine.clone()
    }

    pub fn renderer(&self) -> Arc<dyn ViewRender> {
        self.renderer.clone()
    }

    pub fn options(&self) -> &OverrideOptions {
        &self.options
    }

    /// Adds the manual override route to `app`, then layers the feature context middleware
    /// over every route of it.
    pub fn connect_all<S>(&self, app: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        app.route(
            &self.options.manual_route_path,
            get(manual_route).with_state(self.clone()),
        )
        .layer(middleware::from_fn_with_state(
            self.clone(),
            feature_context,
        ))
    }
}
