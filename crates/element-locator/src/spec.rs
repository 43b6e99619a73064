//! Deferred, retrying resolution of a chain of criteria
//!
//! A [`ResolutionSpec`] describes an element as a path of criteria from the desktop
//! (window, then child, then grandchild...). Nothing is looked up until one of the
//! `resolve*` / `exists` / `wait_*` methods runs; every attempt re-evaluates the
//! whole chain so that a window recreated between attempts is picked up.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use souldesk_element::{Backend, ElementRef};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::criteria::Criteria;
use crate::dump::{control_identifiers, ControlEntry};
use crate::errors::LocateError;
use crate::search::TreeSearch;
use crate::timings::Timings;

/// One step of the chain.
#[derive(Clone)]
pub struct Level {
    pub criteria: Criteria,

    /// Explicit search root; replaces the previous level's element
    pub parent: Option<ElementRef>,
}

impl Level {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            parent: None,
        }
    }

    pub fn under(parent: ElementRef, criteria: Criteria) -> Self {
        Self {
            criteria,
            parent: Some(parent),
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{:?} under {:?}", self.criteria, parent),
            None => write!(f, "{:?}", self.criteria),
        }
    }
}

/// Lifecycle of one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionState::Resolved | ResolutionState::Failed)
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionState::Unresolved => "unresolved",
            ResolutionState::Resolving => "resolving",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a resolution together with how it went.
#[derive(Debug)]
pub struct ResolutionReport<T> {
    pub state: ResolutionState,

    /// Chain evaluations performed
    pub attempts: u32,

    pub elapsed: Duration,

    pub outcome: Result<T, LocateError>,
}

impl<T> ResolutionReport<T> {
    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }

    pub fn into_result(self) -> Result<T, LocateError> {
        self.outcome
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResolutionReport<U> {
        ResolutionReport {
            state: self.state,
            attempts: self.attempts,
            elapsed: self.elapsed,
            outcome: self.outcome.map(f),
        }
    }
}

/// Conditions for [`ResolutionSpec::wait_for`] and [`ResolutionSpec::wait_not`].
///
/// Combine with `|`; parse from whitespace separated words
/// (`"exists visible enabled ready"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaitFor {
    pub exists: bool,
    pub visible: bool,
    pub enabled: bool,
}

impl WaitFor {
    pub const EXISTS: WaitFor = WaitFor {
        exists: true,
        visible: false,
        enabled: false,
    };
    pub const VISIBLE: WaitFor = WaitFor {
        exists: true,
        visible: true,
        enabled: false,
    };
    pub const ENABLED: WaitFor = WaitFor {
        exists: true,
        visible: false,
        enabled: true,
    };
    /// Visible and enabled
    pub const READY: WaitFor = WaitFor {
        exists: true,
        visible: true,
        enabled: true,
    };

    /// Every requested condition holds for `element`
    fn holds(&self, element: &ElementRef) -> Result<bool, LocateError> {
        if self.visible && !element.is_visible()? {
            return Ok(false);
        }
        if self.enabled && !element.is_enabled()? {
            return Ok(false);
        }
        Ok(true)
    }
}

impl BitOr for WaitFor {
    type Output = WaitFor;

    fn bitor(self, rhs: WaitFor) -> WaitFor {
        WaitFor {
            exists: self.exists || rhs.exists,
            visible: self.visible || rhs.visible,
            enabled: self.enabled || rhs.enabled,
        }
    }
}

impl FromStr for WaitFor {
    type Err = LocateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut wait = WaitFor::default();
        for word in s.split(|c: char| c.is_whitespace() || c == ',' || c == '|') {
            wait = wait
                | match word.trim().to_ascii_lowercase().as_str() {
                    "" => continue,
                    "exists" => WaitFor::EXISTS,
                    "visible" => WaitFor::VISIBLE,
                    "enabled" => WaitFor::ENABLED,
                    "ready" => WaitFor::READY,
                    other => {
                        return Err(LocateError::InvalidCriteria(format!(
                            "unknown wait condition '{other}'"
                        )))
                    }
                };
        }
        if wait == WaitFor::default() {
            return Err(LocateError::InvalidCriteria(format!(
                "no wait condition in '{s}'"
            )));
        }
        Ok(wait)
    }
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::new();
        if self.exists {
            words.push("exists");
        }
        if self.visible {
            words.push("visible");
        }
        if self.enabled {
            words.push("enabled");
        }
        f.write_str(&words.join(" "))
    }
}

/// Result of one attempt inside the retry loop
enum Pass<T> {
    Done(T),
    Retry(LocateError),
    Fail(LocateError),
}

impl<T> Pass<T> {
    fn failed(err: LocateError) -> Self {
        if err.is_retryable() {
            Pass::Retry(err)
        } else {
            Pass::Fail(err)
        }
    }
}

impl<T> From<Result<T, LocateError>> for Pass<T> {
    fn from(result: Result<T, LocateError>) -> Self {
        match result {
            Ok(value) => Pass::Done(value),
            Err(err) => Pass::failed(err),
        }
    }
}

/// Immutable description of how to find an element.
#[derive(Clone)]
pub struct ResolutionSpec {
    search: TreeSearch,
    levels: Vec<Level>,
    timings: Timings,
    cancel: Option<CancellationToken>,
}

impl ResolutionSpec {
    /// Chain of `levels`, the first one searched from the desktop
    pub fn new(backend: Arc<dyn Backend>, levels: impl IntoIterator<Item = Criteria>) -> Self {
        Self::from_search(TreeSearch::new(backend), levels)
    }

    pub fn from_search(search: TreeSearch, levels: impl IntoIterator<Item = Criteria>) -> Self {
        Self::from_levels(search, levels.into_iter().map(Level::new).collect())
    }

    pub fn from_levels(search: TreeSearch, levels: Vec<Level>) -> Self {
        Self {
            search,
            levels,
            timings: Timings::default(),
            cancel: None,
        }
    }

    /// New spec with `criteria` searched among all descendants of the current last level
    pub fn append(&self, criteria: Criteria) -> Self {
        self.extended(Level::new(criteria))
    }

    /// New spec with `criteria` searched below an explicit `parent`
    pub fn append_under(&self, parent: ElementRef, criteria: Criteria) -> Self {
        self.extended(Level::under(parent, criteria))
    }

    /// New spec with `criteria` searched among immediate children of the current last level
    pub fn child(&self, criteria: Criteria) -> Self {
        let criteria = match criteria.top_level_only {
            Some(_) => criteria,
            None => criteria.top_level_only(true),
        };
        self.append(criteria)
    }

    pub fn with_timings(&self, timings: Timings) -> Self {
        Self {
            timings,
            ..self.clone()
        }
    }

    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self.clone()
        }
    }

    fn extended(&self, level: Level) -> Self {
        let mut spec = self.clone();
        spec.levels.push(level);
        spec
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn search(&self) -> &TreeSearch {
        &self.search
    }

    /// Resolve to exactly one element within the spec's `find_timeout`
    pub fn resolve(&self) -> Result<ElementRef, LocateError> {
        self.resolve_with(self.timings.find_timeout, self.timings.find_retry)
    }

    pub fn resolve_with(&self, timeout: Duration, retry: Duration) -> Result<ElementRef, LocateError> {
        self.resolve_report(timeout, retry).into_result()
    }

    pub fn resolve_report(&self, timeout: Duration, retry: Duration) -> ResolutionReport<ElementRef> {
        self.run(timeout, retry, || Pass::from(self.resolve_once()))
    }

    /// Every element matching the last level, the levels above resolving uniquely
    pub fn resolve_all(&self) -> Result<Vec<ElementRef>, LocateError> {
        self.resolve_all_with(self.timings.find_timeout, self.timings.find_retry)
    }

    pub fn resolve_all_with(
        &self,
        timeout: Duration,
        retry: Duration,
    ) -> Result<Vec<ElementRef>, LocateError> {
        self.resolve_all_report(timeout, retry).into_result()
    }

    pub fn resolve_all_report(
        &self,
        timeout: Duration,
        retry: Duration,
    ) -> ResolutionReport<Vec<ElementRef>> {
        self.run(timeout, retry, || Pass::from(self.resolve_all_once()))
    }

    /// Whether the element resolves within `exists_timeout`
    pub fn exists(&self) -> bool {
        self.exists_within(self.timings.exists_timeout, self.timings.exists_retry)
    }

    pub fn exists_within(&self, timeout: Duration, retry: Duration) -> bool {
        let report = self.resolve_report(timeout, retry);
        if let Err(err) = &report.outcome {
            if !err.cause().is_retryable() {
                warn!("existence check failed: {}", err);
            }
        }
        report.is_resolved()
    }

    /// Wait until the element resolves and satisfies `wait`
    pub fn wait_for(
        &self,
        wait: WaitFor,
        timeout: Duration,
        retry: Duration,
    ) -> Result<ElementRef, LocateError> {
        self.wait_for_report(wait, timeout, retry).into_result()
    }

    pub fn wait_for_report(
        &self,
        wait: WaitFor,
        timeout: Duration,
        retry: Duration,
    ) -> ResolutionReport<ElementRef> {
        self.run(timeout, retry, || {
            let element = match self.resolve_once() {
                Ok(element) => element,
                Err(err) => return Pass::failed(err),
            };
            match wait.holds(&element) {
                Ok(true) => Pass::Done(element),
                Ok(false) => Pass::Retry(LocateError::ConditionNotMet {
                    element: element.summary(),
                    condition: wait.to_string(),
                }),
                Err(err) => Pass::failed(err),
            }
        })
    }

    /// Wait until the element is gone or no longer satisfies `wait`
    pub fn wait_not(&self, wait: WaitFor, timeout: Duration, retry: Duration) -> Result<(), LocateError> {
        self.run(timeout, retry, || {
            let element = match self.resolve_once() {
                Ok(element) => element,
                Err(err) if err.is_not_found() || err.is_invalid_reference() => {
                    return Pass::Done(())
                }
                Err(err) => return Pass::failed(err),
            };
            if !wait.visible && !wait.enabled {
                return Pass::Retry(LocateError::ConditionNotMet {
                    element: element.summary(),
                    condition: "gone".to_string(),
                });
            }
            match wait.holds(&element) {
                Ok(false) => Pass::Done(()),
                Ok(true) => Pass::Retry(LocateError::ConditionNotMet {
                    element: element.summary(),
                    condition: format!("not {wait}"),
                }),
                Err(err) if err.is_invalid_reference() => Pass::Done(()),
                Err(err) => Pass::failed(err),
            }
        })
        .into_result()
    }

    /// Resolve, then list the control identifiers of the element's subtree
    pub fn dump_tree(&self, depth: Option<usize>) -> Result<Vec<ControlEntry>, LocateError> {
        let element = self.resolve()?;
        control_identifiers(&element, depth)
    }

    fn run<T>(
        &self,
        timeout: Duration,
        retry: Duration,
        mut attempt: impl FnMut() -> Pass<T>,
    ) -> ResolutionReport<T> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let finish = |state: ResolutionState, attempts: u32, outcome: Result<T, LocateError>| {
            debug!("resolution {} after {} attempts", state, attempts);
            ResolutionReport {
                state,
                attempts,
                elapsed: start.elapsed(),
                outcome,
            }
        };

        if self.levels.is_empty() {
            return finish(
                ResolutionState::Failed,
                0,
                Err(LocateError::InvalidCriteria(
                    "resolution chain has no levels".to_string(),
                )),
            );
        }

        let mut state = ResolutionState::Unresolved;
        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                info!("Resolution of {:?} cancelled", self.levels);
                return finish(ResolutionState::Failed, attempts, Err(LocateError::Cancelled));
            }
            if state == ResolutionState::Unresolved {
                debug!("{} -> {}", state, ResolutionState::Resolving);
                state = ResolutionState::Resolving;
            }
            attempts += 1;

            match attempt() {
                Pass::Done(value) => {
                    info!(
                        "Resolved {:?} in {:?} ({} attempts)",
                        self.levels.last().map(|level| &level.criteria),
                        start.elapsed(),
                        attempts
                    );
                    return finish(ResolutionState::Resolved, attempts, Ok(value));
                }
                Pass::Fail(err) => {
                    warn!("Resolution failed: {}", err);
                    return finish(ResolutionState::Failed, attempts, Err(err));
                }
                Pass::Retry(err) => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        warn!(
                            "Resolution timed out after {:?} ({} attempts): {}",
                            elapsed, attempts, err
                        );
                        return finish(
                            ResolutionState::Failed,
                            attempts,
                            Err(LocateError::Timeout {
                                elapsed,
                                attempts,
                                last: Box::new(err),
                            }),
                        );
                    }
                    let pause = retry.min(timeout - elapsed);
                    debug!("Attempt {} failed ({}), retrying in {:?}", attempts, err, pause);
                    thread::sleep(pause);
                }
            }
        }
    }

    /// One evaluation of every level but the last; returns the last level's root
    ///
    /// Levels above the last parent override cannot influence the result and are skipped.
    fn resolve_prefix(&self) -> Result<Option<ElementRef>, LocateError> {
        let mut current: Option<ElementRef> = None;
        let prefix = &self.levels[..self.levels.len().saturating_sub(1)];
        let first = prefix
            .iter()
            .rposition(|level| level.parent.is_some())
            .unwrap_or(0);
        for (depth, level) in prefix.iter().enumerate().skip(first) {
            let root = match &level.parent {
                Some(parent) => Some(parent.clone()),
                None => current,
            };
            debug!("level {}: {}", depth, level.criteria);
            current = Some(self.search.find_element(root.as_ref(), &level.criteria)?);
        }
        Ok(current)
    }

    fn last_level(&self) -> Result<&Level, LocateError> {
        self.levels.last().ok_or_else(|| {
            LocateError::InvalidCriteria("resolution chain has no levels".to_string())
        })
    }

    /// Search root of the last level: its override, else the resolved prefix
    fn last_root(&self, level: &Level) -> Result<Option<ElementRef>, LocateError> {
        match &level.parent {
            Some(parent) => Ok(Some(parent.clone())),
            None => self.resolve_prefix(),
        }
    }

    fn resolve_once(&self) -> Result<ElementRef, LocateError> {
        let level = self.last_level()?;
        let root = self.last_root(level)?;
        self.search.find_element(root.as_ref(), &level.criteria)
    }

    fn resolve_all_once(&self) -> Result<Vec<ElementRef>, LocateError> {
        let level = self.last_level()?;
        let root = self.last_root(level)?;
        let found = self.search.find_elements(root.as_ref(), &level.criteria)?;
        if found.is_empty() {
            return Err(LocateError::NotFound {
                criteria: level.criteria.to_string(),
            });
        }
        Ok(found)
    }
}

impl fmt::Debug for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSpec")
            .field("backend", &self.search.backend().name())
            .field("levels", &self.levels)
            .field("timings", &self.timings)
            .finish()
    }
}
