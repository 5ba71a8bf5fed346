//! CAVE HTTP client
//!
//! Talks to the info service, the PyChunkedGraph segmentation API and the L2
//! cache of one datastack. A single instance is shared by every worker;
//! `reqwest::Client` pools connections internally and the optional rate
//! limiter is lock-free.

use super::{ChunkedGraph, ClientError, DatastackInfo, L2Attributes, LeafId, RootId, StopLayer};
use async_trait::async_trait;
use cgtools_common::config::Settings;
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("cgtools/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const GRAPHENE_PREFIX: &str = "graphene://";
const MIDDLEAUTH_PREFIX: &str = "middleauth+";
const TABLE_MARKER: &str = "/segmentation/table/";

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct LeavesResponse {
    leaf_ids: Vec<LeafId>,
}

#[derive(Debug, Serialize)]
struct L2DataRequest<'a> {
    l2_ids: &'a [LeafId],
}

/// CAVE API client bound to one datastack
pub struct CaveClient {
    http_client: Client,
    token: Option<String>,
    info: DatastackInfo,
    /// PyChunkedGraph server, e.g. `https://cave.fanc-fly.com`
    cg_server: String,
    /// Graph table name
    table: String,
    l2cache_server: String,
    rate_limiter: Option<DirectRateLimiter>,
}

impl CaveClient {
    /// Build the HTTP client and fetch datastack metadata
    pub async fn connect(settings: &Settings) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let rate_limiter = settings
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        let info_url = format!(
            "{}/info/api/v2/datastack/full/{}",
            settings.global_server, settings.datastack
        );
        tracing::debug!(url = %info_url, "Fetching datastack info");

        let mut request = http_client.get(&info_url);
        if let Some(token) = &settings.token {
            request = request.bearer_auth(token);
        }
        let response = check_status(
            request
                .send()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?,
        )
        .await?;
        let info: DatastackInfo = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let (cg_server, table) = parse_segmentation_source(&info.segmentation_source)?;
        let l2cache_server = info
            .local_server
            .clone()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| cg_server.clone());

        tracing::info!(
            datastack = %settings.datastack,
            table = %table,
            server = %cg_server,
            resolution = ?info.viewer_resolution(),
            "Connected to chunked graph"
        );

        Ok(Self {
            http_client,
            token: settings.token.clone(),
            info,
            cg_server,
            table,
            l2cache_server,
            rate_limiter,
        })
    }

    fn segmentation_url(&self, path: &str) -> String {
        format!(
            "{}/segmentation/api/v1/table/{}/{}",
            self.cg_server, self.table, path
        )
    }

    /// Wait for a rate limiter permit, then attach auth
    async fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self
            .prepare(request)
            .await
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                } else {
                    ClientError::Network(e.to_string())
                }
            })?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(ClientError::Api(status.as_u16(), error_text))
}

#[async_trait]
impl ChunkedGraph for CaveClient {
    async fn leaves(&self, node: u64, stop_layer: StopLayer) -> Result<Vec<LeafId>, ClientError> {
        let url = self.segmentation_url(&format!("node/{}/leaves", node));
        let request = self
            .http_client
            .get(&url)
            .query(&[("stop_layer", stop_layer.as_layer())]);

        let response = self.send(request).await?;
        let body: LeavesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(body.leaf_ids)
    }

    async fn current_roots(&self, leaves: &[LeafId]) -> Result<Vec<RootId>, ClientError> {
        let url = self.segmentation_url("roots_binary");
        let request = self.http_client.post(&url).body(encode_ids(leaves));

        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        decode_ids(&bytes)
    }

    async fn rep_coords(
        &self,
        l2_ids: &[LeafId],
    ) -> Result<HashMap<String, L2Attributes>, ClientError> {
        let url = format!(
            "{}/l2cache/api/v1/table/{}/attributes",
            self.l2cache_server, self.table
        );
        let request = self
            .http_client
            .post(&url)
            .query(&[("attribute_names", "rep_coord_nm")])
            .json(&L2DataRequest { l2_ids });

        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn datastack_info(&self) -> Result<DatastackInfo, ClientError> {
        Ok(self.info.clone())
    }
}

/// Split `graphene://{server}/segmentation/table/{table}` into server and table
///
/// The server may carry a `middleauth+` scheme prefix, which only tells the
/// viewer to authenticate; requests go to the plain URL.
fn parse_segmentation_source(source: &str) -> Result<(String, String), ClientError> {
    let rest = source.strip_prefix(GRAPHENE_PREFIX).ok_or_else(|| {
        ClientError::Config(format!("segmentation source is not graphene: {:?}", source))
    })?;
    let rest = rest.strip_prefix(MIDDLEAUTH_PREFIX).unwrap_or(rest);
    let (server, table) = rest.split_once(TABLE_MARKER).ok_or_else(|| {
        ClientError::Config(format!("segmentation source has no table: {:?}", source))
    })?;
    let table = table.trim_end_matches('/');
    if server.is_empty() || table.is_empty() {
        return Err(ClientError::Config(format!(
            "malformed segmentation source: {:?}",
            source
        )));
    }
    Ok((server.to_string(), table.to_string()))
}

/// Pack IDs as little-endian u64, the `roots_binary` wire format
fn encode_ids(ids: &[u64]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.to_le_bytes()).collect()
}

fn decode_ids(bytes: &[u8]) -> Result<Vec<u64>, ClientError> {
    if bytes.len() % 8 != 0 {
        return Err(ClientError::Parse(format!(
            "binary ID payload of {} bytes is not a multiple of 8",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        })
        .collect())
}
