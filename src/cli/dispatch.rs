use super::dump::cmd_dump;
use super::env::CliArgs;
use super::find::cmd_find;
use super::info::cmd_info;
use super::labels::cmd_labels;
use super::matching::cmd_match;
use super::resolve::cmd_resolve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Find(args) => cmd_find(args, ctx).await,
        Commands::Resolve(args) => cmd_resolve(args, ctx).await,
        Commands::Labels(args) => cmd_labels(args, ctx).await,
        Commands::Dump(args) => cmd_dump(args, ctx).await,
        Commands::Match(args) => cmd_match(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
