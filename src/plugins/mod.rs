//! Plugins and scan events.
//!
//! Two channels leave the scan pipeline:
//! - The transform chain: [`Plugin`] hooks called in-line, in registration order,
//!   each seeing the previous plugin's output ([`PluginHost`])
//! - Notifications: [`Event`]s fanned out to observers over per-observer channels
//!   ([`EventBus`]), never blocking the workers
//!
//! A plugin is a name plus optional handler slots. Unset slots are no-ops.
//!
//! ```
//! use dnsbrute::plugins::Plugin;
//!
//! let tagger = Plugin::new("tagger").with_on_result(|result| {
//!     let mut tagged = result.clone();
//!     tagged.target = format!("[seen] {}", tagged.target);
//!     Ok(tagged)
//! });
//! assert_eq!(tagger.name(), "tagger");
//! ```

mod events;
mod host;

pub use events::{DispatchStats, Event, EventBus, EventPayload};
pub use host::PluginHost;

use crate::config::Config;
use crate::error_handling::PluginError;
use crate::models::ProbeResult;

type LoadHook = Box<dyn Fn() -> Result<(), PluginError> + Send + Sync>;
type PreScanHook = Box<dyn Fn(&Config) -> Result<Config, PluginError> + Send + Sync>;
type ResultHook = Box<dyn Fn(&ProbeResult) -> Result<ProbeResult, PluginError> + Send + Sync>;
type PostScanHook =
    Box<dyn Fn(&[ProbeResult]) -> Result<Vec<ProbeResult>, PluginError> + Send + Sync>;

/// A named set of optional scan hooks.
pub struct Plugin {
    name: String,
    on_load: Option<LoadHook>,
    pre_scan: Option<PreScanHook>,
    on_result: Option<ResultHook>,
    post_scan: Option<PostScanHook>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Plugin {
            name: name.into(),
            on_load: None,
            pre_scan: None,
            on_result: None,
            post_scan: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Called once when the scan initializes. An error disables the plugin.
    pub fn with_on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.on_load = Some(Box::new(hook));
        self
    }

    /// Receives the configuration and returns the one the next plugin sees.
    /// Returning [`PluginError::Aborted`] stops the scan before it starts.
    pub fn with_pre_scan<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Config) -> Result<Config, PluginError> + Send + Sync + 'static,
    {
        self.pre_scan = Some(Box::new(hook));
        self
    }

    /// Transforms every result, on the worker that produced it.
    pub fn with_on_result<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ProbeResult) -> Result<ProbeResult, PluginError> + Send + Sync + 'static,
    {
        self.on_result = Some(Box::new(hook));
        self
    }

    /// Transforms the full ordered result list once the scan has finished.
    pub fn with_post_scan<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[ProbeResult]) -> Result<Vec<ProbeResult>, PluginError> + Send + Sync + 'static,
    {
        self.post_scan = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("on_load", &self.on_load.is_some())
            .field("pre_scan", &self.pre_scan.is_some())
            .field("on_result", &self.on_result.is_some())
            .field("post_scan", &self.post_scan.is_some())
            .finish()
    }
}
