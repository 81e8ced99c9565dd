//! Runtime configuration: the knobs a driver would otherwise pass as CLI
//! flags (`-s`/`-m`/channel capacity), collected so an embedder can build
//! them programmatically or load them from a file.
//!
//! Grounded on the original engine's `-s`/`-m` stack-depth/memory-limit
//! options; behind the `config-file` feature, [`Config`] also derives
//! `serde::Deserialize` so a driver can load it from a `toml` file instead
//! of wiring up its own flag parsing.

#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use threadscript_core::{Result, ThreadScriptError};
use threadscript_core::AllocLimits;

use crate::state::DEFAULT_MAX_STACK;

/// Construction-time limits for a [`crate::state::Vm`]/[`crate::state::ThreadState`]
/// pair: call-stack depth, allocator memory budget and the default channel
/// capacity used when a script calls `channel()` with no explicit size is
/// intentionally *not* modeled here — the grammar always requires an
/// explicit capacity argument (§4.5); this only covers whole-VM limits.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct Config {
    /// Maximum call-stack depth before a `ThreadState` raises `op_recursion`.
    pub max_stack: usize,
    /// Byte budget handed to `threadscript_core::Allocator`.
    pub memory_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            memory_limit: usize::MAX,
        }
    }
}

impl Config {
    /// The [`AllocLimits`] a [`crate::state::Vm`] run should enforce for
    /// `memory_limit`; `usize::MAX` (the default) maps to unlimited.
    pub fn alloc_limits(&self) -> AllocLimits {
        if self.memory_limit == usize::MAX {
            AllocLimits::UNLIMITED
        } else {
            AllocLimits::limited(self.memory_limit as u64)
        }
    }
}

#[cfg(feature = "config-file")]
impl Config {
    /// Loads a `Config` from a TOML file, falling back to defaults for any
    /// field the file omits (`#[serde(default)]` on every field).
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ThreadScriptError::wrapped(format!("reading config file: {e}")))?;
        toml::from_str(&text).map_err(|e| ThreadScriptError::wrapped(format!("parsing config file: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_vm_default_max_stack() {
        let cfg = Config::default();
        assert_eq!(cfg.max_stack, DEFAULT_MAX_STACK);
    }

    #[test]
    fn alloc_limits_maps_usize_max_to_unlimited() {
        assert_eq!(Config::default().alloc_limits(), AllocLimits::UNLIMITED);
        let limited = Config {
            memory_limit: 64,
            ..Config::default()
        };
        assert_eq!(limited.alloc_limits(), AllocLimits::limited(64));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn from_toml_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threadscript.toml");
        std::fs::write(&path, "max_stack = 50\n").unwrap();
        let cfg = Config::from_toml_file(&path).unwrap();
        assert_eq!(cfg.max_stack, 50);
        assert_eq!(cfg.memory_limit, usize::MAX);
    }
}
