//! Single-shot tree search
//!
//! Walks the element tree of one backend breadth-first and returns every element
//! satisfying a [`Criteria`]. No retries happen here; see
//! [`ResolutionSpec`](crate::ResolutionSpec) for that.

use std::sync::Arc;

use souldesk_element::{Backend, ElementRef, WalkOptions};
use tracing::{debug, warn};

use crate::criteria::{CompiledCriteria, Criteria};
use crate::errors::LocateError;
use crate::fuzzy::FuzzyMatcher;

/// Depth cap for walks that do not set `depth`
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Tree search over one backend.
#[derive(Clone)]
pub struct TreeSearch {
    backend: Arc<dyn Backend>,
    matcher: FuzzyMatcher,
    max_depth: usize,
}

impl TreeSearch {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            matcher: FuzzyMatcher::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every element below `root` (the desktop when `None`) matching `criteria`,
    /// in breadth-first order.
    ///
    /// With `best_match` the structurally filtered set is ranked and only the best
    /// candidate is kept, unless `found_index` asks for a lower-ranked one.
    /// An out-of-range `found_index` yields an empty list.
    pub fn find_elements(
        &self,
        root: Option<&ElementRef>,
        criteria: &Criteria,
    ) -> Result<Vec<ElementRef>, LocateError> {
        let compiled = CompiledCriteria::compile(criteria)?;
        let backend = self.backend.as_ref();

        let mut found = match &criteria.handle {
            Some(handle) => match backend.from_native(handle) {
                Ok(element) if compiled.accepts(backend, &element) => vec![element],
                Ok(_) => Vec::new(),
                Err(err) if err.is_invalid_reference() => {
                    debug!("handle {} does not resolve: {}", handle, err);
                    Vec::new()
                }
                Err(err) => return Err(err.into()),
            },
            None => {
                let start = match root {
                    Some(root) => root.clone(),
                    None => backend.root()?,
                };
                let top_level_only = criteria.top_level_only.unwrap_or(root.is_none());
                let depth = if top_level_only {
                    1
                } else {
                    criteria.depth.unwrap_or(self.max_depth)
                };
                let filter = |element: &ElementRef| compiled.accepts(backend, element);
                start.descendants(WalkOptions::depth(depth).with_filter(&filter))?
            }
        };
        debug!("{} structural matches for {}", found.len(), criteria);

        if let Some(query) = &criteria.best_match {
            if found.is_empty() {
                return Ok(found);
            }
            if criteria.is_name_only() {
                debug!("ranking all {} candidates by name alone", found.len());
            }
            let ranked = self.matcher.rank(query, &found)?;
            let keep = if criteria.found_index.is_some() {
                ranked.len()
            } else {
                1
            };
            found = ranked
                .into_iter()
                .take(keep)
                .map(|candidate| candidate.element)
                .collect();
        }

        if let Some(index) = criteria.found_index {
            return Ok(found.into_iter().nth(index).into_iter().collect());
        }
        Ok(found)
    }

    /// Exactly one element matching `criteria`
    pub fn find_element(
        &self,
        root: Option<&ElementRef>,
        criteria: &Criteria,
    ) -> Result<ElementRef, LocateError> {
        if criteria.is_empty() {
            warn!("No discriminating criteria given; any element below the root matches");
        }
        let mut found = self.find_elements(root, criteria)?;
        match found.len() {
            0 => Err(LocateError::NotFound {
                criteria: criteria.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count => {
                warn!("{} elements match {}", count, criteria);
                Err(LocateError::Ambiguous {
                    criteria: criteria.to_string(),
                    candidates: found.iter().map(ElementRef::summary).collect(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souldesk_element::{MemoryBackend, MemoryTree, NativeId, NodeSpec};

    fn dialog_tree() -> MemoryTree {
        MemoryTree::from_spec(NodeSpec::new("#32769").children([
            NodeSpec::window("#32770", "Save As").with_id("dlg").children([
                NodeSpec::control("Pane", "").with_id("pane").children([
                    NodeSpec::control("Button", "Save").with_id("save"),
                    NodeSpec::control("Button", "Cancel").with_id("cancel"),
                ]),
                NodeSpec::control("Button", "Help").with_id("help").hidden(),
            ]),
            NodeSpec::window("Notepad", "Untitled - Notepad").with_id("np"),
        ]))
        .unwrap()
    }

    fn search(tree: &MemoryTree) -> TreeSearch {
        TreeSearch::new(Arc::new(MemoryBackend::new(tree.clone())))
    }

    fn ids(elements: &[ElementRef]) -> Vec<String> {
        elements.iter().map(|e| e.native_id().to_string()).collect()
    }

    #[test]
    fn test_desktop_search_is_top_level_by_default() {
        let tree = dialog_tree();
        let search = search(&tree);
        let buttons = search
            .find_elements(None, &Criteria::new().control_type("Button"))
            .unwrap();
        assert!(buttons.is_empty());

        let deep = search
            .find_elements(None, &Criteria::new().control_type("Button").top_level_only(false))
            .unwrap();
        assert_eq!(ids(&deep), vec!["save", "cancel"]);
    }

    #[test]
    fn test_explicit_root_walks_descendants() {
        let tree = dialog_tree();
        let search = search(&tree);
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();

        let buttons = search
            .find_elements(Some(&dialog), &Criteria::new().control_type("Button"))
            .unwrap();
        assert_eq!(ids(&buttons), vec!["save", "cancel"]);

        let with_hidden = search
            .find_elements(
                Some(&dialog),
                &Criteria::new().control_type("Button").visible_only(false),
            )
            .unwrap();
        // breadth-first: the hidden Help button sits one level above the pane's buttons
        assert_eq!(ids(&with_hidden), vec!["help", "save", "cancel"]);

        let shallow = search
            .find_elements(Some(&dialog), &Criteria::new().control_type("Button").depth(1))
            .unwrap();
        assert!(shallow.is_empty());
    }

    #[test]
    fn test_handle_bypasses_walk() {
        let tree = dialog_tree();
        let search = search(&tree);
        let found = search
            .find_elements(None, &Criteria::new().handle("cancel").title("Cancel"))
            .unwrap();
        assert_eq!(ids(&found), vec!["cancel"]);

        let mismatch = search
            .find_elements(None, &Criteria::new().handle("cancel").title("Save"))
            .unwrap();
        assert!(mismatch.is_empty());

        let missing = search
            .find_elements(None, &Criteria::new().handle("no-such-node"))
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_find_element_cardinality() {
        let tree = dialog_tree();
        let search = search(&tree);
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();

        let err = search
            .find_element(Some(&dialog), &Criteria::new().control_type("Button"))
            .unwrap_err();
        assert!(err.is_ambiguous());
        assert_eq!(err.candidates().len(), 2);

        let err = search
            .find_element(Some(&dialog), &Criteria::new().title("Print"))
            .unwrap_err();
        assert!(err.is_not_found());

        let save = search
            .find_element(Some(&dialog), &Criteria::new().title("Save"))
            .unwrap();
        assert_eq!(save.native_id().as_str(), "save");
    }

    #[test]
    fn test_found_index() {
        let tree = dialog_tree();
        let search = search(&tree);
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();
        let criteria = Criteria::new().control_type("Button");

        let second = search
            .find_element(Some(&dialog), &criteria.clone().found_index(1))
            .unwrap();
        assert_eq!(second.native_id().as_str(), "cancel");

        let err = search
            .find_element(Some(&dialog), &criteria.found_index(5))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_best_match_ranks_filtered_set() {
        let tree = dialog_tree();
        let search = search(&tree);
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();

        let found = search
            .find_elements(Some(&dialog), &Criteria::new().best_match("cancel"))
            .unwrap();
        assert_eq!(ids(&found), vec!["cancel"]);

        let runner_up = search
            .find_elements(
                Some(&dialog),
                &Criteria::new()
                    .control_type("Button")
                    .best_match("Button")
                    .found_index(1),
            )
            .unwrap();
        // "Button" labels the first button exactly; the second one only as "Button2"
        assert_eq!(ids(&runner_up), vec!["cancel"]);

        let err = search
            .find_elements(Some(&dialog), &Criteria::new().best_match("Preferences"))
            .unwrap_err();
        assert!(err.is_match_failure());

        let nothing = search
            .find_elements(
                Some(&dialog),
                &Criteria::new().control_type("Slider").best_match("volume"),
            )
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_invalid_regex_fails_fast() {
        let tree = dialog_tree();
        let err = search(&tree)
            .find_elements(None, &Criteria::new().title_re("[unclosed"))
            .unwrap_err();
        assert!(matches!(err, LocateError::InvalidCriteria(_)));
    }

    #[test]
    fn test_stale_root() {
        let tree = dialog_tree();
        let search = search(&tree);
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();
        tree.remove(&NativeId::from("dlg")).unwrap();
        let err = search
            .find_elements(Some(&dialog), &Criteria::new())
            .unwrap_err();
        assert!(err.is_invalid_reference());
    }
}
