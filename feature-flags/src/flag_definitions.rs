use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::engine::{FeatureMap, FlagEngine, UserContext};

pub type Predicate = Arc<dyn Fn(&UserContext) -> bool + Send + Sync>;

/// How a registered flag decides its value.
#[derive(Clone)]
pub enum Criteria {
    /// Registered without criteria, off for everyone.
    Empty,
    Constant(bool),
    Predicate(Predicate),
}

impl Criteria {
    fn check(&self, user: &UserContext) -> bool {
        match self {
            Criteria::Empty => false,
            Criteria::Constant(value) => *value,
            Criteria::Predicate(predicate) => predicate(user),
        }
    }
}

impl fmt::Debug for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Empty => write!(f, "Empty"),
            Criteria::Constant(value) => write!(f, "Constant({})", value),
            Criteria::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// A simple in-process engine: a fixed set of flags, each with its own criteria.
#[derive(Clone, Debug, Default)]
pub struct FlagRegistry {
    flags: BTreeMap<String, Criteria>,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: impl Into<String>, criteria: Criteria) -> Self {
        self.flags.insert(id.into(), criteria);
        self
    }

    pub fn with_flag(self, id: impl Into<String>) -> Self {
        self.register(id, Criteria::Empty)
    }

    pub fn with_constant(self, id: impl Into<String>, value: bool) -> Self {
        self.register(id, Criteria::Constant(value))
    }

    pub fn with_predicate<F>(self, id: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&UserContext) -> bool + Send + Sync + 'static,
    {
        self.register(id, Criteria::Predicate(Arc::new(predicate)))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl FlagEngine for FlagRegistry {
    fn evaluate(&self, user: &UserContext) -> FeatureMap {
        self.flags
            .iter()
            .map(|(id, criteria)| (id.clone(), criteria.check(user)))
            .collect()
    }

    fn is_registered(&self, flag_id: &str) -> bool {
        self.flags.contains_key(flag_id)
    }
}

/// Flags declared through configuration, e.g. `fOpen=true,fClosed=false,fEmpty`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagDefinitions(pub Vec<(String, Option<bool>)>);

#[derive(Debug, PartialEq, Eq)]
pub enum ParseFlagDefinitionsError {
    EmptyId(String),
    InvalidValue(String, String),
    Duplicate(String),
}

impl fmt::Display for ParseFlagDefinitionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFlagDefinitionsError::EmptyId(part) => {
                write!(f, "Missing flag id in definition: {}", part)
            }
            ParseFlagDefinitionsError::InvalidValue(id, value) => {
                write!(f, "Invalid value for flag {}: {}", id, value)
            }
            ParseFlagDefinitionsError::Duplicate(id) => write!(f, "Duplicate flag id: {}", id),
        }
    }
}

impl std::error::Error for ParseFlagDefinitionsError {}

impl FromStr for FlagDefinitions {
    type Err = ParseFlagDefinitionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut definitions: Vec<(String, Option<bool>)> = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (id, value) = match part.split_once('=') {
                Some((id, value)) => (id.trim(), Some(value.trim())),
                None => (part, None),
            };
            if id.is_empty() {
                return Err(ParseFlagDefinitionsError::EmptyId(part.to_string()));
            }
            let value = match value {
                None => None,
                Some(raw) => Some(raw.parse::<bool>().map_err(|_| {
                    ParseFlagDefinitionsError::InvalidValue(id.to_string(), raw.to_string())
                })?),
            };
            if definitions.iter().any(|(existing, _)| existing == id) {
                return Err(ParseFlagDefinitionsError::Duplicate(id.to_string()));
            }
            definitions.push((id.to_string(), value));
        }
        Ok(FlagDefinitions(definitions))
    }
}

impl From<&FlagDefinitions> for FlagRegistry {
    fn from(definitions: &FlagDefinitions) -> Self {
        definitions
            .0
            .iter()
            .fold(FlagRegistry::new(), |registry, (id, value)| match value {
                Some(value) => registry.with_constant(id.clone(), *value),
                None => registry.with_flag(id.clone()),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_evaluate_covers_every_registered_flag() {
        let registry = FlagRegistry::new()
            .with_flag("fEmpty")
            .with_constant("fOpen", true)
            .with_constant("fClosed", false)
            .with_predicate("fEval", |user| user.get("flag") == Some(&json!("abc")));

        let abc = registry.evaluate(&UserContext::new(json!({"flag": "abc"})));
        assert_eq!(abc.len(), 4);
        assert_eq!(abc.get("fEmpty"), Some(&false));
        assert_eq!(abc.get("fOpen"), Some(&true));
        assert_eq!(abc.get("fClosed"), Some(&false));
        assert_eq!(abc.get("fEval"), Some(&true));

        let xyz = registry.evaluate(&UserContext::new(json!({"flag": "xyz"})));
        assert_eq!(xyz.get("fEval"), Some(&false));
    }

    #[test]
    fn test_is_registered() {
        let registry = FlagRegistry::new().with_flag("fEmpty");
        assert!(registry.is_registered("fEmpty"));
        assert!(!registry.is_registered("doesnotexist"));
    }

    #[test]
    fn test_parse_flag_definitions() {
        let definitions: FlagDefinitions = "fOpen=true, fClosed = false,fEmpty,".parse().unwrap();
        assert_eq!(
            definitions,
            FlagDefinitions(vec![
                ("fOpen".to_string(), Some(true)),
                ("fClosed".to_string(), Some(false)),
                ("fEmpty".to_string(), None),
            ])
        );

        let registry = FlagRegistry::from(&definitions);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.evaluate(&UserContext::anonymous()),
            FeatureMap::from([
                ("fClosed".to_string(), false),
                ("fEmpty".to_string(), false),
                ("fOpen".to_string(), true),
            ])
        );
    }

    #[test]
    fn test_parse_empty_flag_definitions() {
        let definitions: FlagDefinitions = "".parse().unwrap();
        assert!(definitions.0.is_empty());
        assert!(FlagRegistry::from(&definitions).is_empty());
    }

    #[test]
    fn test_parse_flag_definitions_errors() {
        assert_eq!(
            "fOpen=yes".parse::<FlagDefinitions>(),
            Err(ParseFlagDefinitionsError::InvalidValue(
                "fOpen".to_string(),
                "yes".to_string()
            ))
        );
        assert_eq!(
            "fOpen,fOpen=true".parse::<FlagDefinitions>(),
            Err(ParseFlagDefinitionsError::Duplicate("fOpen".to_string()))
        );
        assert_eq!(
            "=true".parse::<FlagDefinitions>(),
            Err(ParseFlagDefinitionsError::EmptyId("=true".to_string()))
        );
    }
}
