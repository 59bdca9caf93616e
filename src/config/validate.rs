// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RunwardenError};
use crate::exec::TextEncoding;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RunwardenError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.capture, raw.kill))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_timeout(cfg)?;
    validate_encoding(cfg)?;
    Ok(())
}

fn validate_timeout(cfg: &RawConfigFile) -> Result<()> {
    if cfg.capture.timeout_ms == Some(0) {
        return Err(RunwardenError::ConfigError(
            "[capture].timeout_ms must be >= 1 (got 0); omit it to disable the timeout"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_encoding(cfg: &RawConfigFile) -> Result<()> {
    if TextEncoding::for_label(&cfg.capture.encoding).is_none() {
        return Err(RunwardenError::ConfigError(format!(
            "[capture].encoding '{}' is not a known encoding label",
            cfg.capture.encoding
        )));
    }
    Ok(())
}
