//! HTTP client for the catalog server's application endpoints.

use crate::app::{CurrentUser, MarketplaceApp, RunPage};
use crate::om::parser;
use crate::traits::RunSource;
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result, WrapErr};
use reqwest::{header, Client, RequestBuilder, Url};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OmClient {
    base_url: Url,
    http: Client,
}

impl OmClient {
    /// Builds a client for `server` (e.g. `http://localhost:8585`),
    /// authenticating with `token` as a bearer token when given.
    pub fn new(server: &str, token: Option<&str>) -> Result<Self> {
        let base_url = parse_server_url(server)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .wrap_err("Invalid characters in access token")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("appruns/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self { base_url, http })
    }

    /// Host (and port) shown in the header.
    pub fn host(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// `{base}/api/v1/{segments...}`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| eyre!("Server URL cannot be used as a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                eyre!("Request to {} timed out", self.host())
            } else if e.is_connect() {
                eyre!("Cannot reach server {}", self.host())
            } else {
                eyre!("Request failed: {e}")
            }
        })?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .wrap_err("Failed to read response body")?;
        tracing::debug!(%status, %url, bytes = body.len(), "catalog response");

        if status.is_success() {
            return Ok(body);
        }
        let detail = parser::api_error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => eyre!("Not authorized ({status}). Check --token or APPRUNS_TOKEN."),
            404 => eyre!("Not found: {detail}"),
            _ => eyre!("Server returned {status}: {detail}"),
        })
    }

    pub async fn current_user(&self) -> Result<CurrentUser> {
        let url = self.endpoint(&["users", "loggedInUser"])?;
        let body = self.send(self.http.get(url)).await?;
        parser::parse_current_user(&body)
    }

    pub async fn marketplace_app(&self, name: &str) -> Result<MarketplaceApp> {
        let url = self.endpoint(&["apps", "marketplace", "name", name])?;
        let body = self.send(self.http.get(url)).await?;
        parser::parse_marketplace_app(&body)
    }

    /// Asks the server to start a run of application `name` now.
    pub async fn trigger_run(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&["apps", "trigger", name])?;
        self.send(self.http.post(url)).await?;
        tracing::info!(app = name, "run triggered");
        Ok(())
    }
}

#[async_trait]
impl RunSource for OmClient {
    async fn fetch_runs(&self, entity: &str, offset: usize, limit: usize) -> Result<RunPage> {
        let url = self.endpoint(&["apps", "name", entity, "status"])?;
        let request = self
            .http
            .get(url)
            .query(&[("offset", offset), ("limit", limit)]);
        let body = self.send(request).await?;
        parser::parse_run_page(&body).wrap_err("Unexpected run history response")
    }
}

fn parse_server_url(server: &str) -> Result<Url> {
    let server = server.trim();
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{server}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| eyre!("Invalid server URL '{server}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(eyre!(
            "Server URL must use http or https; got '{}://'",
            url.scheme()
        ));
    }
    if url.host_str().is_none() {
        return Err(eyre!("Server URL must include a host"));
    }
    Ok(url)
}
