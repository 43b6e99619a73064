use anyhow::Result;
use humantime::format_duration;
use serde::Serialize;
use souldesk_element::BackendRegistry;

use crate::app_settings::Config;
use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Debug, Serialize)]
pub struct InfoOutput {
    pub version: String,
    pub build_date: String,
    pub git_commit: String,
    pub git_branch: String,
    pub config_path: String,
    pub config: Config,
    pub backends: Vec<String>,
}

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    // connecting registers the configured backend
    let connected = ctx.desktop().map(|desktop| desktop.backend().name().to_string());

    let output = InfoOutput {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown").to_string(),
        git_commit: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        git_branch: option_env!("GIT_BRANCH").unwrap_or("unknown").to_string(),
        config_path: ctx.config_path().display().to_string(),
        config: ctx.config().clone(),
        backends: BackendRegistry::global().names(),
    };

    emit(ctx.output(), &output, |info| {
        let config = &info.config;
        let mut lines = vec![
            "SoulDesk System Information".to_string(),
            "===========================".to_string(),
            format!("Version: {}", info.version),
            format!("Build Date: {}", info.build_date),
            format!("Git Commit: {} ({})", info.git_commit, info.git_branch),
            String::new(),
            "Configuration:".to_string(),
            format!("- Config File: {}", info.config_path),
            format!("- Backend: {}", config.backend),
            format!(
                "- Element Tree: {}",
                config
                    .tree
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            ),
            format!("- Fuzzy Cutoff: {:.2} ({:?})", config.fuzzy_cutoff, config.tie_break),
            format!("- Max Depth: {}", config.max_depth),
            String::new(),
            "Timings:".to_string(),
            format!(
                "- find: timeout {} / retry {}",
                format_duration(config.timings.find_timeout),
                format_duration(config.timings.find_retry)
            ),
            format!(
                "- exists: timeout {} / retry {}",
                format_duration(config.timings.exists_timeout),
                format_duration(config.timings.exists_retry)
            ),
            String::new(),
            format!("Registered Backends: {}", info.backends.join(", ")),
        ];
        match &connected {
            Ok(name) => lines.push(format!("Connected: {name}")),
            Err(err) => lines.push(format!("Connected: no ({err:#})")),
        }
        lines.join("\n")
    })
}
