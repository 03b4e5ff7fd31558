//! `tordl config-path` – print where the config file lives.

use anyhow::Result;
use std::path::Path;
use tordl_core::config;

pub fn run_config_path(explicit: Option<&Path>) -> Result<()> {
    match explicit {
        Some(p) => println!("{}", p.display()),
        None => println!("{}", config::config_path()?.display()),
    }
    Ok(())
}
