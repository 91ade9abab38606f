use std::net::SocketAddr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::header::{COOKIE, SET_COOKIE};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use feature_flags::config::{Config, DEFAULT_TEST_CONFIG};
use feature_flags::overrides::OverrideMapping;
use feature_flags::server::serve;
use feature_flags::test_utils::{override_cookie_header, overrides_from_set_cookie};

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(|| DEFAULT_TEST_CONFIG.clone());

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub cookie_name: String,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cookie_name = config.cookie_name.clone();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, listener, async move { notify.notified().await }).await
        });
        ServerHandle {
            addr,
            cookie_name,
            shutdown,
        }
    }

    pub async fn get(&self, path: &str, overrides: Option<&OverrideMapping>) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client.get(format!("http://{:?}{}", self.addr, path));
        if let Some(overrides) = overrides {
            request = request.header(COOKIE, override_cookie_header(&self.cookie_name, overrides));
        }
        request.send().await.expect("failed to send request")
    }

    /// Sends `cookie` as the `Cookie` header exactly as given.
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{:?}{}", self.addr, path))
            .header(COOKIE, cookie)
            .send()
            .await
            .expect("failed to send request")
    }

    /// The `name=value` pair of our cookie as written, the way a browser stores and echoes it.
    pub fn cookie_pair_written(&self, response: &reqwest::Response) -> Option<String> {
        let prefix = format!("{}=", self.cookie_name);
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .find(|pair| pair.starts_with(&prefix))
            .map(str::to_string)
    }

    /// The overrides the server wrote back, if it set our cookie.
    pub fn overrides_written(&self, response: &reqwest::Response) -> Option<OverrideMapping> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| overrides_from_set_cookie(&self.cookie_name, value))
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

pub fn overrides(entries: &[(&str, bool)]) -> OverrideMapping {
    entries
        .iter()
        .map(|(id, enabled)| (id.to_string(), *enabled))
        .collect()
}
