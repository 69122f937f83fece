//! HTTP client for the goquery test server
//!
//! Every endpoint is a form-encoded POST answered with JSON. A 404 means
//! the host or query name is unknown to the server.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::core::{BackendError, Host, Rows};

pub const DEFAULT_BASE_URL: &str = "https://localhost:8001/";

const CHECK_HOST_PATH: &str = "checkHost";
const LIST_HOSTS_PATH: &str = "listHosts";
const SCHEDULE_QUERY_PATH: &str = "scheduleQuery";
const FETCH_RESULTS_PATH: &str = "fetchResults";

/// Host record as the server reports it
#[derive(Debug, Deserialize)]
struct ApiHost {
    #[serde(rename = "UUID", default)]
    uuid: String,
    #[serde(rename = "ComputerName", default)]
    computer_name: String,
    #[serde(rename = "HostIdentifier", default)]
    host_identifier: String,
    #[serde(rename = "Platform", default)]
    platform: String,
    #[serde(rename = "Version", default)]
    version: String,
}

impl From<ApiHost> for Host {
    fn from(api: ApiHost) -> Self {
        let name = if api.computer_name.is_empty() {
            api.host_identifier
        } else {
            api.computer_name
        };
        Host::new(api.uuid)
            .with_display_name(name)
            .with_platform(api.platform)
            .with_version(api.version)
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(rename = "queryName")]
    query_name: String,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    /// The server sends `null` before any row arrives
    #[serde(default)]
    results: Option<Rows>,
    #[serde(default)]
    status: String,
}

/// goquery server API client
pub struct GoserverApi {
    client: reqwest::Client,
    base_url: Url,
}

impl GoserverApi {
    pub fn new(base_url: &str, timeout: Duration, insecure_tls: bool) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .cookie_store(true)
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        // Url::join drops the last segment unless the base ends in '/'
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| BackendError::Other(format!("invalid server url '{}': {}", base_url, e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn check_host(&self, uuid: &str) -> Result<Host, BackendError> {
        match self.post(CHECK_HOST_PATH, &[("uuid", uuid)]).await? {
            Some(host) => Ok(Host::from(decode::<ApiHost>(&host)?)),
            None => Err(BackendError::HostNotFound(uuid.to_string())),
        }
    }

    pub async fn list_hosts(&self) -> Result<Vec<Host>, BackendError> {
        match self.post(LIST_HOSTS_PATH, &[]).await? {
            Some(body) => Ok(decode::<Vec<ApiHost>>(&body)?
                .into_iter()
                .map(Host::from)
                .collect()),
            None => Err(BackendError::Unsupported(
                "server does not expose host discovery".to_string(),
            )),
        }
    }

    pub async fn schedule_query(&self, uuid: &str, sql: &str) -> Result<String, BackendError> {
        match self
            .post(SCHEDULE_QUERY_PATH, &[("uuid", uuid), ("query", sql)])
            .await?
        {
            Some(body) => Ok(decode::<ScheduleResponse>(&body)?.query_name),
            None => Err(BackendError::HostNotFound(uuid.to_string())),
        }
    }

    pub async fn fetch_results(&self, query_name: &str) -> Result<(Rows, String), BackendError> {
        match self
            .post(FETCH_RESULTS_PATH, &[("queryName", query_name)])
            .await?
        {
            Some(body) => {
                let response = decode::<ResultsResponse>(&body)?;
                Ok((response.results.unwrap_or_default(), response.status))
            }
            None => Err(BackendError::QueryNotFound(query_name.to_string())),
        }
    }

    /// POST a form; `Ok(None)` on 404, the body text on 200
    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<Option<String>, BackendError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BackendError::Other(format!("invalid endpoint '{}': {}", path, e)))?;

        tracing::debug!("goserver: POST {}", url);
        let response = self.client.post(url).form(form).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!("goserver: {} returned {}", path, status);
            return Err(BackendError::Http(status.as_u16()));
        }

        Ok(Some(response.text().await?))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::debug!("goserver: undecodable body: {}", body);
        BackendError::Parse(e.to_string())
    })
}
