use std::time::Duration;

use anyhow::Context;
use indexmap::IndexMap;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::BackendOptions;
use crate::poi::Poi;
use crate::timeline::{decode_blocks, ScheduleBlock};

pub mod wire;

pub use wire::{
    FormPayload, MealOptions, MoreCardsResponse, PlanRequest, PlanResponse, PreviewRequest,
    PreviewResponse, RecommendResponse, RoughPlan,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} timed out")]
    Timeout { endpoint: &'static str },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ApiError::Transport { endpoint, .. }
            | ApiError::Timeout { endpoint }
            | ApiError::Status { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// The planning backend. Calls block; the app runs them on worker threads.
pub trait TripBackend: Send + Sync {
    fn recommend(&self, form: &FormPayload) -> Result<RecommendResponse, ApiError>;

    fn recommend_more(&self, start: usize, size: usize) -> Result<Vec<Poi>, ApiError>;

    fn plan(&self, request: &PlanRequest) -> Result<PlanResponse, ApiError>;

    /// Returns the per-day blocks keyed by the backend's own day strings.
    fn preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<IndexMap<String, Vec<ScheduleBlock>>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(options: &BackendOptions) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T, ApiError> {
        tracing::info!(endpoint, "calling backend");
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .map_err(|err| transport_error(endpoint, err))?;
        read_json(endpoint, response)
    }
}

impl TripBackend for HttpBackend {
    fn recommend(&self, form: &FormPayload) -> Result<RecommendResponse, ApiError> {
        self.post("/recommend", form)
    }

    fn recommend_more(&self, start: usize, size: usize) -> Result<Vec<Poi>, ApiError> {
        let endpoint = "/recommend/more";
        tracing::info!(endpoint, start, size, "calling backend");
        let response = self
            .client
            .get(self.url(endpoint))
            .query(&[("start", start), ("size", size)])
            .send()
            .map_err(|err| transport_error(endpoint, err))?;
        let body: MoreCardsResponse = read_json(endpoint, response)?;
        Ok(body.cards)
    }

    fn plan(&self, request: &PlanRequest) -> Result<PlanResponse, ApiError> {
        self.post("/plan", request)
    }

    fn preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<IndexMap<String, Vec<ScheduleBlock>>, ApiError> {
        let raw: PreviewResponse = self.post("/preview", request)?;
        Ok(decode_preview(raw))
    }
}

/// Decodes each day's blocks individually so one bad entry does not void the day.
pub fn decode_preview(raw: PreviewResponse) -> IndexMap<String, Vec<ScheduleBlock>> {
    raw.into_iter()
        .map(|(day, values)| {
            let blocks = decode_blocks(&day, values);
            (day, blocks)
        })
        .collect()
}

fn transport_error(endpoint: &'static str, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout { endpoint }
    } else {
        ApiError::Transport {
            endpoint,
            source: err,
        }
    }
}

fn read_json<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| transport_error(endpoint, err))?;
    if !status.is_success() {
        tracing::warn!(endpoint, status = status.as_u16(), "backend returned an error status");
        return Err(ApiError::Status {
            endpoint,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode { endpoint, source })
}

fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= LIMIT {
        trimmed.to_string()
    } else {
        let mut short: String = trimmed.chars().take(LIMIT).collect();
        short.push('…');
        short
    }
}
