use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use element_locator::{Desktop, LocateError};
use once_cell::sync::OnceCell;
use souldesk_element::{BackendRegistry, MemoryBackend, MemoryTree, MEMORY_BACKEND};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app_settings::Config;
use crate::cli::output::OutputFormat;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
    cancel: CancellationToken,
    desktop: OnceCell<Desktop>,
}

impl CliContext {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        output: OutputFormat,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            cancel,
            desktop: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Desktop of the configured backend, connected on first use
    pub fn desktop(&self) -> Result<&Desktop> {
        self.desktop.get_or_try_init(|| self.connect())
    }

    fn connect(&self) -> Result<Desktop> {
        let registry = BackendRegistry::global();
        let backend = self.config.backend.as_str();

        if backend == MEMORY_BACKEND && !registry.contains(MEMORY_BACKEND) {
            let tree = match &self.config.tree {
                Some(path) => MemoryTree::load(path)
                    .with_context(|| format!("Failed to load element tree {}", path.display()))?,
                None => {
                    warn!("No element tree configured; the desktop is empty");
                    MemoryTree::new()
                }
            };
            registry.register(Arc::new(MemoryBackend::new(tree)));
        }

        let desktop = Desktop::from_registry(registry, backend).with_context(|| {
            format!(
                "Backend '{}' is not available (registered: {})",
                backend,
                registry.names().join(", ")
            )
        })?;
        debug!("Desktop ready on backend {}", backend);

        Ok(desktop
            .with_timings(self.config.timings)
            .with_matcher(self.config.matcher())
            .with_max_depth(self.config.max_depth)
            .with_cancel(self.cancel.clone()))
    }

    /// Run a blocking locator job off the async runtime
    pub async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Desktop) -> Result<T, LocateError> + Send + 'static,
    {
        let desktop = self.desktop()?.clone();
        let outcome = tokio::task::spawn_blocking(move || job(desktop))
            .await
            .context("Locator task panicked")?;
        Ok(outcome?)
    }
}
