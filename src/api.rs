/*
 *  api.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Backend HTTP client: configuration, data feeds and health
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use flate2::read::GzDecoder;
use log::{debug, warn};
use reqwest::{Client, header};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

use crate::appconfig::AppConfig;

const USER_AGENT: &str = concat!("pantalla v", env!("CARGO_PKG_VERSION"));
const MAX_RETRIES: u8 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{path} answered with status {status}")]
    Status { path: String, status: u16 },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid API base '{0}'")]
    InvalidBase(String),
}

/// The four dashboard feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Weather,
    News,
    Astronomy,
    Calendar,
}

impl Feed {
    pub const ALL: [Feed; 4] = [Feed::Weather, Feed::News, Feed::Astronomy, Feed::Calendar];

    pub fn path(&self) -> &'static str {
        match self {
            Feed::Weather => "/weather",
            Feed::News => "/news",
            Feed::Astronomy => "/astronomy",
            Feed::Calendar => "/calendar",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path().trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// Anything that can produce a feed document
pub trait FeedSource: Send + Sync {
    fn fetch(&self, feed: Feed) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    client: Client,
}

/// Bodies may arrive gzipped even when the server does not say so.
fn decode_body(raw: &[u8]) -> String {
    let mut decoder = GzDecoder::new(raw);
    let mut decoded = String::new();
    match decoder.read_to_string(&mut decoded) {
        Ok(_) => decoded,
        Err(_) => String::from_utf8_lossy(raw).to_string(),
    }
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = base.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ApiError::InvalidBase(base.to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_millis(1500)))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { base: base.to_string(), client })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Transport failures are retried, an HTTP status is final.
    async fn get_with_retries(&self, path: &str) -> Result<String, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        loop {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(ApiError::Status {
                            path: path.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    let raw = response.bytes().await?;
                    return Ok(decode_body(&raw));
                }
                Err(e) => {
                    retries += 1;
                    if retries >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    debug!("GET {} failed ({}), retry {}", url, e, retries);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let body = self.get_with_retries(path).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn get_config(&self) -> Result<AppConfig, ApiError> {
        let v = self.get_json("/config").await?;
        Ok(AppConfig::from_value(v)?)
    }

    /// Replace the stored configuration; the echoed document is returned.
    pub async fn put_config(&self, config: &AppConfig) -> Result<AppConfig, ApiError> {
        let response = self.client.put(self.url("/config")).json(config).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { path: "/config".into(), status: status.as_u16() });
        }
        let raw = response.bytes().await?;
        let v: Value = serde_json::from_str(&decode_body(&raw))?;
        Ok(AppConfig::from_value(v)?)
    }

    pub async fn ping(&self) -> Connectivity {
        match self.client.get(self.url("/health")).send().await {
            Ok(r) if r.status().is_success() => Connectivity::Online,
            Ok(r) => {
                debug!("health answered {}", r.status());
                Connectivity::Offline
            }
            Err(e) => {
                debug!("health check failed: {}", e);
                Connectivity::Offline
            }
        }
    }
}

impl FeedSource for ApiClient {
    async fn fetch(&self, feed: Feed) -> Result<Value, ApiError> {
        self.get_json(feed.path()).await.inspect_err(|e| {
            warn!("{} feed unavailable: {}", feed, e);
        })
    }
}
