//! Network probes.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::Arc;

use crate::config::ProbeMethod;
use crate::error_handling::ProbeError;
use crate::target::Target;

/// What a single successful probe attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Performs one network request attempt against a target.
///
/// Any HTTP status is a successful probe; `Err` is reserved for transport failures.
/// Implementations must not retry: the scheduler's retry state machine owns that.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> Result<ProbeResponse, ProbeError>;
}

/// Probes targets over HTTP(S) with a shared `reqwest` client.
pub struct HttpProber {
    client: Arc<reqwest::Client>,
    method: ProbeMethod,
}

impl HttpProber {
    pub fn new(client: Arc<reqwest::Client>, method: ProbeMethod) -> Self {
        HttpProber { client, method }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target) -> Result<ProbeResponse, ProbeError> {
        let request = match self.method {
            ProbeMethod::Head => self.client.head(&target.url),
            ProbeMethod::Get => self.client.get(&target.url),
        };
        let response = request.send().await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type,
            content_length,
        })
    }
}
