use anyhow::{bail, Result};
use clap::Args;
use element_locator::fuzzy::similarity;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct MatchArgs {
    /// Text to look for
    pub query: String,

    /// Candidate texts
    #[arg(required = true)]
    pub candidates: Vec<String>,

    /// Acceptance cutoff (defaults to the configured one)
    #[arg(long)]
    pub cutoff: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MatchOutput {
    pub query: String,
    pub cutoff: f64,
    pub best: Option<String>,
    pub scores: Vec<CandidateScore>,
}

#[derive(Debug, Serialize)]
pub struct CandidateScore {
    pub text: String,
    pub score: f64,
}

pub async fn cmd_match(args: MatchArgs, ctx: &CliContext) -> Result<()> {
    let mut matcher = ctx.config().matcher();
    if let Some(cutoff) = args.cutoff {
        if !(0.0..=1.0).contains(&cutoff) {
            bail!("--cutoff must lie in [0, 1], got {}", cutoff);
        }
        matcher.cutoff = cutoff;
    }

    let best = matcher
        .best_text_match(&args.query, &args.candidates)
        .map(|(index, _)| args.candidates[index].clone());
    let output = MatchOutput {
        scores: args
            .candidates
            .iter()
            .map(|text| CandidateScore {
                text: text.clone(),
                score: similarity(&args.query, text),
            })
            .collect(),
        query: args.query,
        cutoff: matcher.cutoff,
        best,
    };

    emit(ctx.output(), &output, |output| {
        let mut lines: Vec<String> = output
            .scores
            .iter()
            .map(|candidate| format!("{:.3}  {}", candidate.score, candidate.text))
            .collect();
        match &output.best {
            Some(best) => lines.push(format!("best: {best}")),
            None => lines.push(format!("no candidate reaches {:.2}", output.cutoff)),
        }
        lines.join("\n")
    })?;

    if output.best.is_none() {
        bail!("no candidate for '{}' reaches the cutoff", output.query);
    }
    Ok(())
}
