use anyhow::Result;
use clap::Args;
use serde::Serialize;
use souldesk_element::{ElementRef, ElementSummary};

use crate::cli::context::CliContext;
use crate::cli::criteria::parse_levels;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct LabelsArgs {
    /// Chain to the element whose subtree is labelled; the whole desktop when omitted
    #[arg(short = 'L', long = "level", value_name = "PAIRS")]
    pub levels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LabelEntry {
    pub label: String,
    pub element: ElementSummary,
}

pub async fn cmd_labels(args: LabelsArgs, ctx: &CliContext) -> Result<()> {
    let levels = parse_levels(&args.levels)?;

    let entries = ctx
        .run_blocking(move |desktop| {
            let root = if levels.is_empty() {
                None
            } else {
                Some(desktop.spec(levels).resolve()?)
            };
            let index = desktop.unique_labels(root.as_ref())?;
            let summaries: Vec<ElementSummary> =
                index.elements().iter().map(ElementRef::summary).collect();
            Ok(index
                .entries()
                .map(|(label, ordinal)| LabelEntry {
                    label: label.to_string(),
                    element: summaries[ordinal].clone(),
                })
                .collect::<Vec<_>>())
        })
        .await?;

    emit(ctx.output(), &entries, |entries| {
        let width = entries.iter().map(|entry| entry.label.len()).max().unwrap_or(0);
        entries
            .iter()
            .map(|entry| format!("{:<width$}  {}", entry.label, entry.element, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    })
}
