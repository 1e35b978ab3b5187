//! Plugin lifecycle and transform chains.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, warn};

use super::Plugin;
use crate::config::Config;
use crate::error_handling::{FaultType, PluginError, ProcessingStats, ScanError};
use crate::models::ProbeResult;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a hook, turning a panic into a `PluginError`.
fn guarded<T>(hook: impl FnOnce() -> Result<T, PluginError>) -> Result<T, PluginError> {
    catch_unwind(AssertUnwindSafe(hook))
        .unwrap_or_else(|payload| Err(PluginError::Panicked(panic_message(payload))))
}

/// Registered plugins that survived `on_load`, in registration order.
pub struct PluginHost {
    plugins: Vec<Plugin>,
    disabled: Vec<String>,
    stats: Arc<ProcessingStats>,
}

impl PluginHost {
    /// Calls `on_load` once per plugin in registration order.
    ///
    /// A plugin whose `on_load` fails is logged and left out of every later hook.
    pub fn load(plugins: Vec<Plugin>, stats: Arc<ProcessingStats>) -> Self {
        let mut loaded = Vec::with_capacity(plugins.len());
        let mut disabled = Vec::new();

        for plugin in plugins {
            let outcome = match &plugin.on_load {
                Some(hook) => guarded(|| hook()),
                None => Ok(()),
            };
            match outcome {
                Ok(()) => {
                    debug!("Loaded plugin '{}'", plugin.name());
                    loaded.push(plugin);
                }
                Err(e) => {
                    warn!("Plugin '{}' failed to load, disabling it: {}", plugin.name(), e);
                    stats.increment_fault(FaultType::PluginLoad);
                    disabled.push(plugin.name().to_string());
                }
            }
        }

        PluginHost {
            plugins: loaded,
            disabled,
            stats,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Plugins disabled by a failing `on_load`.
    pub fn disabled(&self) -> &[String] {
        &self.disabled
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Chains `pre_scan` so each plugin sees the previous plugin's configuration.
    ///
    /// # Errors
    ///
    /// Any abort or fault stops the chain with `ScanError::PluginAborted`.
    pub fn pre_scan(&self, config: Config) -> Result<Config, ScanError> {
        let mut current = config;
        for plugin in &self.plugins {
            let Some(hook) = &plugin.pre_scan else {
                continue;
            };
            current = guarded(|| hook(&current)).map_err(|e| {
                let reason = match e {
                    PluginError::Aborted(reason) => reason,
                    other => other.to_string(),
                };
                ScanError::PluginAborted {
                    plugin: plugin.name().to_string(),
                    reason,
                }
            })?;
        }
        Ok(current)
    }

    /// Chains `on_result`. A faulting plugin is skipped: the value it was given
    /// flows on to the next plugin unchanged.
    pub fn on_result(&self, result: ProbeResult) -> ProbeResult {
        let mut current = result;
        for plugin in &self.plugins {
            let Some(hook) = &plugin.on_result else {
                continue;
            };
            match guarded(|| hook(&current)) {
                Ok(next) => current = next,
                Err(e) => {
                    warn!(
                        "Plugin '{}' on_result failed for {}: {}",
                        plugin.name(),
                        current.target,
                        e
                    );
                    self.stats.increment_fault(FaultType::PluginResult);
                }
            }
        }
        current
    }

    /// Chains `post_scan` over the full ordered results. A fault passes the last
    /// good value through.
    pub fn post_scan(&self, results: Vec<ProbeResult>) -> Vec<ProbeResult> {
        let mut current = results;
        for plugin in &self.plugins {
            let Some(hook) = &plugin.post_scan else {
                continue;
            };
            match guarded(|| hook(&current)) {
                Ok(next) => current = next,
                Err(e) => {
                    warn!("Plugin '{}' post_scan failed: {}", plugin.name(), e);
                    self.stats.increment_fault(FaultType::PluginPostScan);
                }
            }
        }
        current
    }
}
