use std::net::SocketAddr;
use std::ops::Deref;
use std::str::FromStr;

use axum_extra::extract::cookie::{Cookie, SameSite};
use envconfig::Envconfig;
use once_cell::sync::Lazy;

use crate::flag_definitions::FlagDefinitions;

pub const DEFAULT_COOKIE_NAME: &str = "fflip";
pub const DEFAULT_MANUAL_ROUTE_PATH: &str = "/fflip/:name/:action";
pub const DEFAULT_COOKIE_PATH: &str = "/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SameSitePolicy(pub SameSite);

impl FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lax" => Ok(SameSitePolicy(SameSite::Lax)),
            "strict" => Ok(SameSitePolicy(SameSite::Strict)),
            "none" => Ok(SameSitePolicy(SameSite::None)),
            _ => Err(format!("Invalid SameSite value: {}", s)),
        }
    }
}

/// Attributes applied to every override cookie we write.
#[derive(Envconfig, Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    #[envconfig(from = "COOKIE_MAX_AGE_SECS")]
    pub max_age_secs: Option<i64>,

    #[envconfig(from = "COOKIE_PATH")]
    pub path: Option<String>,

    #[envconfig(from = "COOKIE_DOMAIN")]
    pub domain: Option<String>,

    #[envconfig(from = "COOKIE_SECURE", default = "false")]
    pub secure: FlexBool,

    #[envconfig(from = "COOKIE_HTTP_ONLY", default = "false")]
    pub http_only: FlexBool,

    #[envconfig(from = "COOKIE_SAME_SITE")]
    pub same_site: Option<SameSitePolicy>,
}

impl CookieOptions {
    /// Builds a cookie carrying these attributes. Without a configured path the cookie is
    /// scoped to `/`, so it is sent on every route and not just the manual one.
    pub fn build_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value))
            .path(
                self.path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COOKIE_PATH.to_string()),
            )
            .secure(*self.secure)
            .http_only(*self.http_only);

        if let Some(max_age) = self.max_age_secs {
            builder = builder.max_age(time::Duration::seconds(max_age));
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(SameSitePolicy(same_site)) = self.same_site {
            builder = builder.same_site(same_site);
        }
        builder.build()
    }
}

/// The knobs of the feature flip integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideOptions {
    pub cookie_name: String,
    pub cookie_options: CookieOptions,
    pub manual_route_path: String,
}

impl Default for OverrideOptions {
    fn default() -> Self {
        OverrideOptions {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_options: CookieOptions::default(),
            manual_route_path: DEFAULT_MANUAL_ROUTE_PATH.to_string(),
        }
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3001")]
    pub address: SocketAddr,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,

    #[envconfig(default = "false")]
    pub enable_metrics: bool,

    #[envconfig(from = "FLAGS", default = "")]
    pub flags: FlagDefinitions,

    #[envconfig(from = "COOKIE_NAME", default = "fflip")]
    pub cookie_name: String,

    #[envconfig(from = "MANUAL_ROUTE_PATH", default = "/fflip/:name/:action")]
    pub manual_route_path: String,

    #[envconfig(from = "COOKIES_ENABLED", default = "true")]
    pub cookies_enabled: FlexBool,

    #[envconfig(nested = true)]
    pub cookie: CookieOptions,
}

impl Config {
    pub fn override_options(&self) -> OverrideOptions {
        OverrideOptions {
            cookie_name: self.cookie_name.clone(),
            cookie_options: self.cookie.clone(),
            manual_route_path: self.manual_route_path.clone(),
        }
    }

    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from_str("127.0.0.1:0").expect("valid test address"),
            debug: FlexBool(false),
            enable_metrics: false,
            flags: "fEmpty,fOpen=true,fClosed=false"
                .parse()
                .expect("valid test flags"),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            manual_route_path: DEFAULT_MANUAL_ROUTE_PATH.to_string(),
            cookies_enabled: FlexBool(true),
            cookie: CookieOptions::default(),
        }
    }
}

pub static DEFAULT_TEST_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);
