use std::fmt;
use std::str::FromStr;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::instrument;

use crate::api::{FlipError, ManualActionResult};
use crate::engine::FlagEngine;
use crate::integration::FeatureFlip;
use crate::middleware::RequestCookies;
use crate::overrides::{self, OverrideMapping};

pub const MANUAL_ACTIONS_COUNTER: &str = "fflip_manual_actions_total";

/// Label for action segments that are not one of the known codes.
const INVALID_ACTION_LABEL: &str = "invalid";

/// What a client can do to one entry of its own override mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Enable,
    Disable,
    Remove,
}

impl ManualAction {
    pub fn code(&self) -> &'static str {
        match self {
            ManualAction::Enable => "1",
            ManualAction::Disable => "0",
            ManualAction::Remove => "-1",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ManualAction::Enable => "enabled",
            ManualAction::Disable => "disabled",
            ManualAction::Remove => "removed",
        }
    }

    pub fn apply(&self, overrides: &mut OverrideMapping, name: &str) {
        match self {
            ManualAction::Enable => {
                overrides.insert(name.to_string(), true);
            }
            ManualAction::Disable => {
                overrides.insert(name.to_string(), false);
            }
            ManualAction::Remove => {
                overrides.remove(name);
            }
        }
    }
}

impl FromStr for ManualAction {
    type Err = FlipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(ManualAction::Enable),
            "0" => Ok(ManualAction::Disable),
            "-1" => Ok(ManualAction::Remove),
            other => Err(FlipError::BadInput(other.to_string())),
        }
    }
}

impl fmt::Display for ManualAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Applies one manual action to a client's overrides.
///
/// Checks run in a fixed order and the first failure wins: the flag must be registered,
/// cookie support must be present (`overrides` is `None` otherwise), and the action code
/// must be recognised. On failure the caller's overrides are left untouched.
pub fn flip(
    engine: &dyn FlagEngine,
    overrides: Option<OverrideMapping>,
    name: &str,
    action: &str,
) -> Result<(OverrideMapping, ManualActionResult), FlipError> {
    if !engine.is_registered(name) {
        return Err(FlipError::FeatureNotFound(name.to_string()));
    }
    let mut overrides = overrides.ok_or(FlipError::CookiesUnavailable)?;
    let action: ManualAction = action.parse()?;

    action.apply(&mut overrides, name);

    let result = ManualActionResult {
        feature: name.to_string(),
        action: action.code().to_string(),
        status: 200,
        message: format!("feature {} is now {}", name, action.label()),
    };
    Ok((overrides, result))
}

/// Counts one manual request. Labels come from fixed sets only: the path segment is
/// client controlled and never becomes a series of its own.
pub fn record_manual_action(action: &str, error: Option<&FlipError>) {
    let action = action
        .parse::<ManualAction>()
        .map(|action| action.code())
        .unwrap_or(INVALID_ACTION_LABEL);
    let result = error.map_or("ok", FlipError::error_code);
    metrics::counter!(MANUAL_ACTIONS_COUNTER, "action" => action, "result" => result).increment(1);
}

#[derive(Debug, Deserialize)]
pub struct ManualRouteParams {
    pub name: String,
    pub action: String,
}

/// `GET {manual_route_path}`: flips one override and writes the cookie back.
#[instrument(skip_all, fields(feature = %params.name, action = %params.action))]
pub async fn manual_route(
    State(flip_state): State<FeatureFlip>,
    Path(params): Path<ManualRouteParams>,
    cookies: Option<Extension<RequestCookies>>,
) -> Result<(CookieJar, Json<ManualActionResult>), FlipError> {
    let options = flip_state.options();
    let current = cookies.map(|Extension(cookies)| cookies.overrides(&options.cookie_name));

    match flip(
        flip_state.engine().as_ref(),
        current,
        &params.name,
        &params.action,
    ) {
        Ok((overrides, result)) => {
            record_manual_action(&params.action, None);
            tracing::info!(overrides = overrides.len(), "{}", result.message);

            let cookie = options
                .cookie_options
                .build_cookie(&options.cookie_name, overrides::encode(&overrides));
            Ok((CookieJar::new().add(cookie), Json(result)))
        }
        Err(e) => {
            record_manual_action(&params.action, Some(&e));
            Err(e)
        }
    }
}
