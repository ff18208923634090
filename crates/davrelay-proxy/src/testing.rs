//! Test doubles shared by unit tests.

use crate::error::FetchError;
use crate::upstream::{OutboundRequest, UpstreamFetch, UpstreamResponse};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use http::{HeaderMap, StatusCode};
use std::sync::{Arc, Mutex};

/// Canned upstream response.
#[derive(Debug, Clone)]
pub(crate) struct FakeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub chunks: Vec<&'static str>,
}

impl Default for FakeResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: vec!["ok"],
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Respond(FakeResponse),
    Fail(FetchError),
    Hang,
}

/// Fetcher that records every outbound request and answers from a script.
#[derive(Debug, Clone)]
pub(crate) struct FakeFetcher {
    outcome: Outcome,
    calls: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl FakeFetcher {
    pub fn ok(response: FakeResponse) -> Self {
        Self::with_outcome(Outcome::Respond(response))
    }

    pub fn err(error: FetchError) -> Self {
        Self::with_outcome(Outcome::Fail(error))
    }

    /// Never produces response headers.
    pub fn hang() -> Self {
        Self::with_outcome(Outcome::Hang)
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl UpstreamFetch for FakeFetcher {
    async fn fetch(&self, request: OutboundRequest) -> Result<UpstreamResponse, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        match &self.outcome {
            Outcome::Respond(response) => {
                let chunks: Vec<Result<Bytes, FetchError>> = response
                    .chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                    .collect();
                Ok(UpstreamResponse {
                    status: response.status,
                    headers: response.headers.clone(),
                    body: stream::iter(chunks).boxed(),
                })
            }
            Outcome::Fail(error) => Err(error.clone()),
            Outcome::Hang => std::future::pending().await,
        }
    }
}
