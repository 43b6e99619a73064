use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use element_locator::{ResolutionReport, ResolutionState, WaitFor};
use serde::Serialize;
use souldesk_element::{ElementRef, ElementSummary};

use crate::cli::context::CliContext;
use crate::cli::criteria::parse_levels;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// One level of the chain as `key=value` pairs; repeat from window to control
    #[arg(short = 'L', long = "level", value_name = "PAIRS", required = true)]
    pub levels: Vec<String>,

    /// Retry budget (e.g. `5s`, `500ms`); defaults to the configured find timeout
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Pause between attempts; defaults to the configured find retry
    #[arg(long, value_parser = humantime::parse_duration)]
    pub retry: Option<Duration>,

    /// Return every match of the last level
    #[arg(long, conflicts_with = "wait")]
    pub all: bool,

    /// Also wait for conditions: `exists`, `visible`, `enabled`, `ready`
    #[arg(long, value_name = "CONDITIONS")]
    pub wait: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub state: ResolutionState,
    pub attempts: u32,
    pub elapsed_ms: u128,
    pub elements: Vec<ElementSummary>,
}

impl ResolveOutput {
    fn from_report(report: ResolutionReport<Vec<ElementRef>>) -> Result<Self> {
        let elements = report.outcome?;
        Ok(Self {
            state: report.state,
            attempts: report.attempts,
            elapsed_ms: report.elapsed.as_millis(),
            elements: elements.iter().map(ElementRef::summary).collect(),
        })
    }
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext) -> Result<()> {
    let levels = parse_levels(&args.levels)?;
    if levels.is_empty() {
        bail!("at least one --level is required");
    }
    let wait = args.wait.as_deref().map(str::parse::<WaitFor>).transpose()?;
    let timings = ctx.config().timings;
    let timeout = args.timeout.unwrap_or(timings.find_timeout);
    let retry = args.retry.unwrap_or(timings.find_retry);
    let all = args.all;

    let report = ctx
        .run_blocking(move |desktop| {
            let spec = desktop.spec(levels);
            let report = if all {
                spec.resolve_all_report(timeout, retry)
            } else if let Some(wait) = wait {
                spec.wait_for_report(wait, timeout, retry)
                    .map(|element| vec![element])
            } else {
                spec.resolve_report(timeout, retry)
                    .map(|element| vec![element])
            };
            Ok(report)
        })
        .await?;

    let output = ResolveOutput::from_report(report)?;
    emit(ctx.output(), &output, |output| {
        let mut lines: Vec<String> = output.elements.iter().map(ToString::to_string).collect();
        lines.push(format!(
            "{} in {} ms ({} attempts)",
            output.state, output.elapsed_ms, output.attempts
        ));
        lines.join("\n")
    })
}
