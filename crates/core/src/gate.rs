use std::path::PathBuf;

use crate::config::GateConfig;

/// Decides whether this process performs downloads at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Injected decision, never consults the environment.
    Fixed(bool),
    /// Re-evaluated on every launch decision.
    Environment {
        override_var: String,
        sandbox_marker: PathBuf,
    },
}

impl Gate {
    pub fn from_config(config: &GateConfig) -> Self {
        Gate::Environment {
            override_var: config.override_var.clone(),
            sandbox_marker: config.sandbox_marker.clone(),
        }
    }

    pub fn allows_download(&self) -> bool {
        match self {
            Gate::Fixed(allowed) => *allowed,
            Gate::Environment {
                override_var,
                sandbox_marker,
            } => {
                // an empty value does not count as an override
                let overridden = std::env::var_os(override_var)
                    .map(|v| !v.is_empty())
                    .unwrap_or(false);
                overridden || !sandbox_marker.exists()
            }
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Gate::from_config(&GateConfig::default())
    }
}
