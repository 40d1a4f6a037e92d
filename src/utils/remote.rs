use crate::error::{EngineError, Result};
use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("unipkg/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| EngineError::RemoteFetchError(format!("Could not build HTTP client: {}", e)))
}

/// GET `url` and return the body. Non-success statuses are errors.
pub async fn fetch_url(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::RemoteFetchError(format!("Network error for {}: {}", url, e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(EngineError::RemoteFetchError(format!(
            "{} answered with status code {}",
            url, status
        )));
    }

    resp.text()
        .await
        .map_err(|e| EngineError::RemoteFetchError(format!("Could not read body of {}: {}", url, e)))
}
