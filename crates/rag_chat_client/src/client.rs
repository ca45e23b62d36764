//! HTTP client for the answering service: liveness probe (`GET /healthz`) and
//! answer query (`POST /answer`).

use std::time::{Duration, Instant};

use crate::config::Endpoint;
use crate::messages::{AnswerReply, AnswerRequest};

/// Client error. Every variant is a failed request from the caller's view;
/// a success body lacking `text` is not an error (see [`AnswerReply::from_json`]).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// DNS, connect, reset, or any other failure before a status arrived.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status.
    #[error("HTTP {0}")]
    Status(u16),

    /// 2xx status whose body is not JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Build the shared `reqwest` client. No request timeout is set.
pub fn http_client() -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("rag-chat/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Whole milliseconds, rounded to nearest.
pub fn round_ms(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

/// Answering-service client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl Client {
    pub fn new(http: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Issue one liveness probe. Returns the round-trip time on a 2xx status.
    pub async fn probe(&self) -> Result<Duration, ClientError> {
        let started = Instant::now();
        let response = self.http.get(self.endpoint.healthz_url()).send().await?;
        let elapsed = started.elapsed();
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }
        Ok(elapsed)
    }

    /// Send a query and parse the answer. Also returns the instant the
    /// response headers arrived, before the body is read.
    pub async fn answer(
        &self,
        query: &str,
        top_k: u32,
    ) -> Result<(AnswerReply, Instant), ClientError> {
        let request = AnswerRequest::new(query, top_k);
        let response = self
            .http
            .post(self.endpoint.answer_url())
            .json(&request)
            .send()
            .await?;
        let responded = Instant::now();

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        Ok((AnswerReply::from_json(&value), responded))
    }
}
