use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flag id -> enabled state. Ordered so serialized output is stable.
pub type FeatureMap = BTreeMap<String, bool>;

/// The user a request is evaluated for. Supplied by the host application and handed to the
/// engine untouched; nothing in this crate looks inside it.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserContext(Value);

impl UserContext {
    pub fn new(value: Value) -> Self {
        UserContext(value)
    }

    pub fn anonymous() -> Self {
        UserContext(Value::Null)
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_null()
    }

    /// Looks up a top level field, for predicates that key on a user attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// The evaluation engine, consumed as an opaque capability. Implementations are process
/// wide and read-mostly, so they get shared across concurrent requests behind an `Arc`.
pub trait FlagEngine: Send + Sync {
    /// Evaluates every registered flag for `user`.
    fn evaluate(&self, user: &UserContext) -> FeatureMap;

    fn is_registered(&self, flag_id: &str) -> bool;
}
