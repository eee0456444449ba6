use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use portgate_core::config::ServicesConfig;
use portgate_core::domain::caller::CallerContext;

use crate::error::UpstreamError;

#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub timeout: Duration,
    pub max_connections: u32,
    pub api_key: Option<SecretString>,
}

impl PoolSettings {
    pub fn from_config(services: &ServicesConfig) -> Self {
        Self {
            timeout: Duration::from_secs(services.timeout_secs.max(1)),
            max_connections: services.max_connections.max(1),
            api_key: services.api_key.clone(),
        }
    }
}

/// Shared outbound handle for one collaborator. Cloning shares the underlying
/// connection pool and the in-flight permit budget.
#[derive(Clone, Debug)]
pub struct ServicePool {
    name: &'static str,
    base_url: String,
    client: Client,
    permits: Arc<Semaphore>,
    timeout: Duration,
    api_key: Option<SecretString>,
}

impl ServicePool {
    pub fn new(
        name: &'static str,
        base_url: &str,
        settings: PoolSettings,
    ) -> Result<Self, UpstreamError> {
        let max_connections = usize::try_from(settings.max_connections.max(1)).unwrap_or(1);
        let client = Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(max_connections)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| UpstreamError::Unavailable(format!("{name} client: {error}")))?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            permits: Arc::new(Semaphore::new(max_connections)),
            timeout: settings.timeout,
            api_key: settings.api_key,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Free slots in the in-flight budget.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Base URL extended by `segments`, each percent-encoded as a single path
    /// segment so identifiers can never add or climb path levels.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let invalid = |detail: String| UpstreamError::Unavailable(format!("{} url: {detail}", self.name));
        let mut url = Url::parse(&self.base_url).map_err(|error| invalid(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("`{}` cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issues a GET and returns the response body with any `{"data": ...}`
    /// envelope removed. Dropping the returned future aborts the call and
    /// releases its permit.
    pub async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        caller: &CallerContext,
        resource: &str,
    ) -> Result<Value, UpstreamError> {
        let _permit =
            tokio::time::timeout(self.timeout, Arc::clone(&self.permits).acquire_owned())
                .await
                .map_err(|_| UpstreamError::Timeout)?
                .map_err(|_| UpstreamError::Unavailable(format!("{} pool closed", self.name)))?;

        let url = self.endpoint(segments)?;
        debug!(
            event_name = "upstream.pool.request",
            correlation_id = %caller.trace_id,
            collaborator = self.name,
            path = %url.path(),
            "calling collaborator"
        );

        let response = self
            .client
            .get(url)
            .headers(self.headers(caller))
            .query(query)
            .send()
            .await
            .map_err(|error| self.transport_error(caller, error))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                event_name = "upstream.pool.status",
                correlation_id = %caller.trace_id,
                collaborator = self.name,
                status = status.as_u16(),
                "collaborator returned non-success status"
            );
            return Err(UpstreamError::from_status(status.as_u16(), resource));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|error| UpstreamError::Decode(error.to_string()))?;
        Ok(unwrap_envelope(body))
    }

    fn headers(&self, caller: &CallerContext) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&caller.trace_id) {
            headers.insert("x-request-id", value);
        }
        if let Some(token) = &caller.auth_token {
            if let Ok(mut value) = HeaderValue::from_str(token.expose_secret()) {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        if let Some(api_key) = &self.api_key {
            if let Ok(mut value) = HeaderValue::from_str(api_key.expose_secret()) {
                value.set_sensitive(true);
                headers.insert("x-api-key", value);
            }
        }
        headers
    }

    fn transport_error(&self, caller: &CallerContext, error: reqwest::Error) -> UpstreamError {
        warn!(
            event_name = "upstream.pool.transport_failed",
            correlation_id = %caller.trace_id,
            collaborator = self.name,
            timeout = error.is_timeout(),
            "collaborator call failed"
        );
        if error.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unavailable(format!("{}: {}", self.name, error.without_url()))
        }
    }
}

fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(|data| !data.is_null()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Pulls a record list out of a body that is either a bare array or an
/// object keyed by `key`.
pub(crate) fn list_field(body: Value, key: &str) -> Result<Vec<Value>, UpstreamError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(UpstreamError::Decode(format!("`{key}` is not a list: {other}"))),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(UpstreamError::Decode(format!("expected a list, got {other}"))),
    }
}
