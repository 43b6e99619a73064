use anyhow::Result;
use clap::Args;
use souldesk_element::{ElementRef, ElementSummary};
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::criteria::{parse_levels, CriteriaArgs};
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct FindArgs {
    #[command(flatten)]
    pub criteria: CriteriaArgs,

    /// Resolve this chain first and search below its element (repeatable)
    #[arg(long = "root", value_name = "PAIRS")]
    pub root: Vec<String>,

    /// Require exactly one match
    #[arg(long)]
    pub one: bool,
}

pub async fn cmd_find(args: FindArgs, ctx: &CliContext) -> Result<()> {
    let criteria = args.criteria.to_criteria()?;
    let root_chain = parse_levels(&args.root)?;
    info!("Searching for {}", criteria);

    let one = args.one;
    let found: Vec<ElementRef> = ctx
        .run_blocking(move |desktop| {
            let root = if root_chain.is_empty() {
                None
            } else {
                Some(desktop.spec(root_chain).resolve()?)
            };
            if one {
                Ok(vec![desktop.find_element(root.as_ref(), &criteria)?])
            } else {
                desktop.find_elements(root.as_ref(), &criteria)
            }
        })
        .await?;

    let summaries: Vec<ElementSummary> = found.iter().map(ElementRef::summary).collect();
    emit(ctx.output(), &summaries, |summaries| {
        if summaries.is_empty() {
            return "No matching elements".to_string();
        }
        summaries
            .iter()
            .map(|summary| summary.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    })
}
