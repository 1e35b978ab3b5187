//! HTTP client initialization.

use std::sync::Arc;

use reqwest::ClientBuilder;

use crate::config::Config;
use crate::error_handling::InitializationError;

/// Initializes the HTTP client shared by every worker.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from the config
/// - Per-request timeout (the retry loop bounds each attempt as well)
/// - Optional proxy for all schemes
/// - Certificate verification unless `verify_ssl` is off
/// - No redirect following, so 3xx statuses reach the result
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the proxy URL or client
/// builder is rejected by `reqwest`.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, InitializationError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(!config.verify_ssl);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    Ok(Arc::new(builder.build()?))
}
