pub mod api;
pub mod config;
pub mod engine;
pub mod flag_definitions;
pub mod integration;
pub mod manual_route;
pub mod metrics;
pub mod middleware;
pub mod overrides;
pub mod render;
pub mod resolver;
pub mod router;
pub mod server;

// Shared with the integration tests under tests/, so not gated on cfg(test).
pub mod test_utils;
