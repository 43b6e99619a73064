use anyhow::Result;
use clap::Args;
use element_locator::{control_identifiers, render_identifiers};

use crate::cli::context::CliContext;
use crate::cli::criteria::parse_levels;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct DumpArgs {
    /// Chain to the element to dump; the whole desktop when omitted
    #[arg(short = 'L', long = "level", value_name = "PAIRS")]
    pub levels: Vec<String>,

    /// Levels below the element to include
    #[arg(long)]
    pub depth: Option<usize>,
}

pub async fn cmd_dump(args: DumpArgs, ctx: &CliContext) -> Result<()> {
    let levels = parse_levels(&args.levels)?;
    let depth = args.depth;

    let entries = ctx
        .run_blocking(move |desktop| {
            if levels.is_empty() {
                control_identifiers(&desktop.root()?, depth)
            } else {
                desktop.spec(levels).dump_tree(depth)
            }
        })
        .await?;

    emit(ctx.output(), &entries, |entries| render_identifiers(entries))
}
