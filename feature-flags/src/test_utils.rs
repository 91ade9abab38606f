use axum_extra::extract::cookie::Cookie;
use percent_encoding::percent_decode_str;
use serde_json::json;

use crate::engine::UserContext;
use crate::flag_definitions::FlagRegistry;
use crate::overrides::{self, OverrideMapping};

fn flag_is(user: &UserContext, expected: &str) -> bool {
    user.get("flag").and_then(|v| v.as_str()) == Some(expected)
}

/// A registry shaped like a typical deployment: constant flags, a flag without criteria,
/// and a few that depend on the user's `flag` attribute.
pub fn fixture_registry() -> FlagRegistry {
    FlagRegistry::new()
        .with_flag("fEmpty")
        .with_constant("fOpen", true)
        .with_constant("fClosed", false)
        .with_predicate("fEval", |user| flag_is(user, "abc"))
        .with_predicate("fEvalOr", |user| {
            flag_is(user, "abc") || flag_is(user, "efg")
        })
        .with_predicate("fEvalVeto", |user| flag_is(user, "abc"))
}

/// A user context carrying the `flag` attribute the fixture predicates look at.
pub fn user(flag: &str) -> UserContext {
    UserContext::new(json!({ "flag": flag }))
}

/// A `Cookie` request header value carrying `overrides` under `name`.
pub fn override_cookie_header(name: &str, overrides: &OverrideMapping) -> String {
    format!("{}={}", name, overrides::encode(overrides))
}

/// Pulls the overrides out of a `Set-Cookie` header value written under `name`. The value
/// may or may not be percent-encoded by the transport.
pub fn overrides_from_set_cookie(name: &str, set_cookie: &str) -> Option<OverrideMapping> {
    let cookie = Cookie::parse(set_cookie.to_string()).ok()?;
    if cookie.name() != name {
        return None;
    }
    let value = percent_decode_str(cookie.value()).decode_utf8().ok()?;
    Some(overrides::decode(&value))
}
