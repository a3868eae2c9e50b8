pub mod index;
pub mod search;

use crate::core::config::{resolve_config, Config};
use anyhow::Context;
use std::path::Path;

/// Settings shared by every sub-command.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: Config,
    pub threads: usize,
    pub verbosity: u8,
}

impl RunContext {
    pub fn load(config: Option<&Path>, threads: usize, verbosity: u8) -> anyhow::Result<Self> {
        let config = resolve_config(config).context("loading the configuration")?;
        Ok(Self {
            config,
            threads,
            verbosity,
        })
    }
}
