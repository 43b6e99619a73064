//! Entry point bound to one backend

use std::sync::Arc;

use souldesk_element::{Backend, BackendRegistry, ElementRef, WalkOptions};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::criteria::Criteria;
use crate::errors::LocateError;
use crate::fuzzy::{FuzzyMatcher, ScoredCandidate};
use crate::labels::NameIndex;
use crate::search::TreeSearch;
use crate::spec::ResolutionSpec;
use crate::timings::Timings;

/// The desktop of one backend: immediate searches plus factories for deferred specs.
#[derive(Clone)]
pub struct Desktop {
    search: TreeSearch,
    timings: Timings,
    cancel: Option<CancellationToken>,
}

impl Desktop {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            search: TreeSearch::new(backend),
            timings: Timings::default(),
            cancel: None,
        }
    }

    /// Desktop of a backend registered in the process-wide registry
    pub fn connect(backend: &str) -> Result<Self, LocateError> {
        Self::from_registry(BackendRegistry::global(), backend)
    }

    pub fn from_registry(registry: &BackendRegistry, backend: &str) -> Result<Self, LocateError> {
        let backend = registry.get(backend)?;
        info!("Connected to {} backend", backend.name());
        Ok(Self::new(backend))
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.search = self.search.with_matcher(matcher);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.search = self.search.with_max_depth(max_depth);
        self
    }

    /// Specs created from this desktop observe `cancel`
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        self.search.backend()
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn search(&self) -> &TreeSearch {
        &self.search
    }

    pub fn root(&self) -> Result<ElementRef, LocateError> {
        Ok(self.backend().root()?)
    }

    pub fn find_elements(
        &self,
        root: Option<&ElementRef>,
        criteria: &Criteria,
    ) -> Result<Vec<ElementRef>, LocateError> {
        self.search.find_elements(root, criteria)
    }

    pub fn find_element(
        &self,
        root: Option<&ElementRef>,
        criteria: &Criteria,
    ) -> Result<ElementRef, LocateError> {
        self.search.find_element(root, criteria)
    }

    /// Deferred top-level window
    pub fn window(&self, criteria: Criteria) -> ResolutionSpec {
        self.spec([criteria])
    }

    /// Deferred chain starting at a top-level window
    pub fn spec(&self, levels: impl IntoIterator<Item = Criteria>) -> ResolutionSpec {
        let spec = ResolutionSpec::from_search(self.search.clone(), levels)
            .with_timings(self.timings);
        match &self.cancel {
            Some(cancel) => spec.with_cancel(cancel.clone()),
            None => spec,
        }
    }

    /// Top-level windows matching `criteria`, right now
    pub fn windows(&self, criteria: &Criteria) -> Result<Vec<ElementRef>, LocateError> {
        self.search.find_elements(None, criteria)
    }

    /// Unique labels of every element below `root` (the desktop when `None`)
    pub fn unique_labels(&self, root: Option<&ElementRef>) -> Result<NameIndex, LocateError> {
        let elements = self.subtree(root, false)?;
        self.search.matcher().unique_labels(&elements)
    }

    /// Best fuzzy match for `query` among the visible elements below `root`
    pub fn best_match(
        &self,
        root: Option<&ElementRef>,
        query: &str,
    ) -> Result<ScoredCandidate, LocateError> {
        let elements = self.subtree(root, true)?;
        self.search.matcher().best_match(query, &elements)
    }

    fn subtree(&self, root: Option<&ElementRef>, visible_only: bool) -> Result<Vec<ElementRef>, LocateError> {
        let start = match root {
            Some(root) => root.clone(),
            None => self.root()?,
        };
        let visible = |element: &ElementRef| element.is_visible().unwrap_or(false);
        let mut options = WalkOptions::depth(self.search.max_depth());
        if visible_only {
            options = options.with_filter(&visible);
        }
        Ok(start.descendants(options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souldesk_element::{MemoryBackend, MemoryTree, NodeSpec, MEMORY_BACKEND};

    fn tree() -> MemoryTree {
        MemoryTree::from_spec(NodeSpec::new("#32769").children([
            NodeSpec::window("Notepad", "Untitled - Notepad")
                .with_id("np")
                .child(NodeSpec::control("Edit", "").with_id("edit")),
            NodeSpec::window("#32770", "Save As").with_id("dlg").children([
                NodeSpec::control("Button", "Save").with_id("save"),
                NodeSpec::control("Button", "Cancel").with_id("cancel").hidden(),
            ]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_connect_through_registry() {
        let registry = BackendRegistry::new();
        assert!(Desktop::from_registry(&registry, MEMORY_BACKEND).is_err());

        registry.register(Arc::new(MemoryBackend::new(tree())));
        let desktop = Desktop::from_registry(&registry, MEMORY_BACKEND).unwrap();
        assert_eq!(desktop.backend().name(), MEMORY_BACKEND);
        assert_eq!(desktop.windows(&Criteria::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_window_spec_inherits_settings() {
        let timings = Timings::defaults().scaled(0.5);
        let desktop = Desktop::new(Arc::new(MemoryBackend::new(tree()))).with_timings(timings);
        let spec = desktop.window(Criteria::new().title("Save As"));
        assert_eq!(*spec.timings(), timings);
        let save = spec.append(Criteria::new().title("Save")).resolve().unwrap();
        assert_eq!(save.native_id().as_str(), "save");
    }

    #[test]
    fn test_labels_and_best_match() {
        let desktop = Desktop::new(Arc::new(MemoryBackend::new(tree())));
        let labels = desktop.unique_labels(None).unwrap();
        assert_eq!(labels.elements().len(), 5);
        assert!(labels.get("Cancel").is_some());

        let best = desktop.best_match(None, "save").unwrap();
        assert_eq!(best.element.native_id().as_str(), "save");

        // hidden elements are not candidates
        let err = desktop.best_match(None, "Cancel").unwrap_err();
        assert!(err.is_match_failure());
    }
}
