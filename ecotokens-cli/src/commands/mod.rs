//! CLI command implementations.

pub mod auth;
pub mod clear;
pub mod estimate;
pub mod export;
pub mod history;
pub mod ingest;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod watch;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Reads `path`, or standard input when it is `None` or `-`.
pub(crate) async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("Failed to read {}", p.display())),
        _ => tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read standard input")?;
            Ok(buf)
        })
        .await?,
    }
}
