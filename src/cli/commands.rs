use clap::Subcommand;

use super::dump::DumpArgs;
use super::find::FindArgs;
use super::labels::LabelsArgs;
use super::matching::MatchArgs;
use super::resolve::ResolveArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Search the element tree once with a set of criteria
    Find(FindArgs),

    /// Resolve a window-to-control chain, retrying until it appears
    Resolve(ResolveArgs),

    /// List the unique labels of every element below a root
    Labels(LabelsArgs),

    /// Print the control identifiers of a subtree
    Dump(DumpArgs),

    /// Score candidate texts against a query with the fuzzy matcher
    Match(MatchArgs),

    /// Show build information and the effective configuration
    Info,
}
