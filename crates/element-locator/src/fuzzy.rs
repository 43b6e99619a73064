//! Fuzzy name matching
//!
//! Free-text queries are compared against the unique labels of a candidate set.
//! Text is cut at the first tab / line break (menu accelerators, multi-line
//! captions), stripped of non-alphanumerics and case-folded, then scored with an
//! indel-distance ratio in `[0, 1]`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use souldesk_element::{ElementRef, Rect};
use tracing::{debug, warn};

use crate::errors::LocateError;
use crate::labels::NameIndex;

/// Minimum score a candidate needs to be accepted
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// How equally scored candidates for different elements are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Element whose rectangle is above, then left of, the other wins
    #[default]
    ReadingOrder,

    /// First element in traversal order wins
    TraversalOrder,
}

/// Candidate accepted by the matcher.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub element: ElementRef,

    /// Label that produced the score
    pub label: String,

    pub score: f64,

    /// Position in the candidate list
    pub ordinal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyMatcher {
    pub cutoff: f64,
    pub tie_break: TieBreak,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            tie_break: TieBreak::default(),
        }
    }
}

impl FuzzyMatcher {
    /// Cutoffs are clamped to `[0, 1]`; a non-finite one falls back to [`DEFAULT_CUTOFF`]
    pub fn new(cutoff: f64) -> Self {
        let cutoff = if cutoff.is_finite() {
            cutoff.clamp(0.0, 1.0)
        } else {
            warn!("Ignoring fuzzy cutoff {}; using {}", cutoff, DEFAULT_CUTOFF);
            DEFAULT_CUTOFF
        };
        Self {
            cutoff,
            ..Self::default()
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Unique labels for every element of the snapshot
    pub fn unique_labels(&self, elements: &[ElementRef]) -> Result<NameIndex, LocateError> {
        NameIndex::build(elements)
    }

    /// Single best candidate for `query`
    pub fn best_match(
        &self,
        query: &str,
        candidates: &[ElementRef],
    ) -> Result<ScoredCandidate, LocateError> {
        let mut ranked = self.rank(query, candidates)?;
        Ok(ranked.remove(0))
    }

    /// Every candidate at or above the cutoff, best first.
    ///
    /// Each element is scored by its best label. Never returns an empty list.
    pub fn rank(
        &self,
        query: &str,
        candidates: &[ElementRef],
    ) -> Result<Vec<ScoredCandidate>, LocateError> {
        let index = NameIndex::build(candidates)?;
        let wanted = normalize(query);

        let mut best: Vec<Option<(f64, &str)>> = vec![None; candidates.len()];
        for (label, ordinal) in index.entries() {
            let score = ratio(&wanted, &normalize(label));
            match best[ordinal] {
                Some((current, _)) if current >= score => {}
                _ => best[ordinal] = Some((score, label)),
            }
        }

        let mut accepted: Vec<(ScoredCandidate, Option<Rect>)> = best
            .into_iter()
            .enumerate()
            .filter_map(|(ordinal, entry)| {
                let (score, label) = entry?;
                if score < self.cutoff {
                    return None;
                }
                let element = candidates[ordinal].clone();
                let rect = match self.tie_break {
                    TieBreak::ReadingOrder => element.rectangle().ok(),
                    TieBreak::TraversalOrder => None,
                };
                Some((
                    ScoredCandidate {
                        element,
                        label: label.to_string(),
                        score,
                        ordinal,
                    },
                    rect,
                ))
            })
            .collect();

        if accepted.is_empty() {
            debug!("no label close enough to '{}' among {} labels", query, index.len());
            return Err(LocateError::Match {
                query: query.to_string(),
                cutoff: self.cutoff,
                pool: index.labels().map(str::to_string).collect(),
            });
        }

        accepted.sort_by(|(a, a_rect), (b, b_rect)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| match (a_rect, b_rect) {
                    (Some(a_rect), Some(b_rect)) => a_rect.reading_order(b_rect),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });

        debug!(
            "best match for '{}': '{}' ({:.2}), {} accepted",
            query,
            accepted[0].0.label,
            accepted[0].0.score,
            accepted.len()
        );
        Ok(accepted.into_iter().map(|(candidate, _)| candidate).collect())
    }

    /// Best plain-text candidate: `(index, score)`; ties go to the lowest index
    pub fn best_text_match<S: AsRef<str>>(&self, query: &str, texts: &[S]) -> Option<(usize, f64)> {
        let wanted = normalize(query);
        let mut best: Option<(usize, f64)> = None;
        for (position, text) in texts.iter().enumerate() {
            let score = ratio(&wanted, &normalize(text.as_ref()));
            if score < self.cutoff {
                continue;
            }
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((position, score));
            }
        }
        best
    }
}

/// Cut at the first tab, then at the first line break
pub fn clean_text(text: &str) -> &str {
    let text = text.split('\t').next().unwrap_or(text);
    text.split(['\r', '\n']).next().unwrap_or(text)
}

/// Cleaned, alphanumeric-only, case-folded form used for scoring
pub fn normalize(text: &str) -> String {
    clean_text(text)
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `2 * LCS / (len_a + len_b)` over characters; two empty strings score 1.0
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

/// Score of `candidate` against `query` after normalising both
pub fn similarity(query: &str, candidate: &str) -> f64 {
    ratio(&normalize(query), &normalize(candidate))
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &left in a {
        for (j, &right) in b.iter().enumerate() {
            current[j + 1] = if left == right {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
