// src/config/model.rs

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{CaptureDefaults, TextEncoding};
use crate::kill::{KillStrategy, strategy_for};
use crate::types::TreeKillMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [capture]
/// timeout_ms = 30000
/// encoding = "utf-8"
///
/// [kill]
/// tree_kill = "auto"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub capture: CaptureSection,

    #[serde(default)]
    pub kill: KillSection,
}

/// `[capture]` section: defaults for capture invocations.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSection {
    /// Default deadline in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// WHATWG label of the encoding used to decode output.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            encoding: default_encoding(),
        }
    }
}

/// `[kill]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KillSection {
    /// `"auto"` (default), `"always"` or `"never"`.
    #[serde(default)]
    pub tree_kill: TreeKillMode,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or `Default`), so the
/// encoding label is known to resolve and the timeout is non-zero.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub capture: CaptureSection,
    pub kill: KillSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(capture: CaptureSection, kill: KillSection) -> Self {
        Self { capture, kill }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.capture.timeout_ms.map(Duration::from_millis)
    }

    pub fn encoding(&self) -> TextEncoding {
        TextEncoding::for_label_or_utf8(&self.capture.encoding)
    }

    pub fn capture_defaults(&self) -> CaptureDefaults {
        CaptureDefaults {
            timeout: self.default_timeout(),
            encoding: self.encoding(),
        }
    }

    pub fn kill_strategy(&self) -> Arc<dyn KillStrategy> {
        strategy_for(self.kill.tree_kill)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(CaptureSection::default(), KillSection::default())
    }
}
