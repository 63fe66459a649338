// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport for the Cloudflare v4 API.
//!
//! The client owns the credential headers and always advertises gzip;
//! bodies are decompressed here so callers only ever see decoded text.
//! Non-2xx responses are mapped to the structured [`ApiError`] envelope
//! before a caller can touch the body.

use crate::error::{ApiError, PollError};
use crate::planner::QueryParams;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING};
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, info};

/// Production endpoint; overridable so tests can point at a local server.
pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Credential pair sent on every request.
#[derive(Debug, Clone)]
pub struct Auth {
    pub email: String,
    pub key: String,
}

/// Reusable client for zone lookups and log retrieval.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

#[derive(Debug, Deserialize)]
struct ZoneListResponse {
    #[serde(default)]
    result: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

impl CloudflareClient {
    /// Builds a client with the credential headers baked in.
    pub fn new(base_url: impl Into<String>, auth: &Auth) -> Result<Self, PollError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(
            "X-Auth-Email",
            HeaderValue::from_str(&auth.email).map_err(|_| {
                PollError::InvalidConfig("auth email is not a valid header value".to_string())
            })?,
        );
        headers.insert(
            "X-Auth-Key",
            HeaderValue::from_str(&auth.key).map_err(|_| {
                PollError::InvalidConfig("auth key is not a valid header value".to_string())
            })?,
        );
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            headers,
        })
    }

    /// Issues a GET and returns the status plus the decoded body.
    ///
    /// Bodies declaring gzip content-encoding are decompressed before being
    /// handed back. Non-2xx statuses become an [`ApiError`] carrying
    /// whatever `{success, errors}` envelope the body held.
    pub async fn call(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, String), PollError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "sending request to Cloudflare");
        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);
        let bytes = response.bytes().await?;
        let body = if gzipped {
            decompress_gzip(&bytes)?
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        if !status.is_success() {
            return Err(ApiError::from_response(url, status.as_u16(), &body).into());
        }
        info!(status = status.as_u16(), "received response from Cloudflare API");
        Ok((status, body))
    }

    /// Resolves the zone identifier for a domain. Called once at startup.
    pub async fn zone_id(&self, domain: &str) -> Result<String, PollError> {
        let (_, body) = self
            .call("/zones", &[("status", "active".to_string())])
            .await?;
        let zones: ZoneListResponse = serde_json::from_str(&body)?;
        zones
            .result
            .into_iter()
            .find(|zone| zone.name == domain)
            .map(|zone| zone.id)
            .ok_or_else(|| PollError::ZoneNotFound(domain.to_string()))
    }

    /// Fetches one batch of log lines for the zone. The body is returned
    /// raw; callers hand it to [`crate::parse::parse_log_lines`].
    pub async fn fetch_log_lines(
        &self,
        zone_id: &str,
        params: &QueryParams,
    ) -> Result<String, PollError> {
        let path = format!("/zones/{zone_id}/logs/requests");
        let (_, body) = self.call(&path, &params.to_query()).await?;
        Ok(body)
    }
}

fn decompress_gzip(body: &[u8]) -> Result<String, PollError> {
    let mut decoder = GzDecoder::new(body);
    let mut decoded = String::new();
    decoder.read_to_string(&mut decoded)?;
    Ok(decoded)
}
