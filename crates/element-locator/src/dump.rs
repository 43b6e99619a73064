//! Control identifiers listing
//!
//! Depth-first dump of a subtree with, for each element, its summary, the labels
//! it can be reached by and criteria that select it.

use std::fmt::Write as _;

use serde::Serialize;
use souldesk_element::{ElementRef, ElementResult, ElementSummary};
use tracing::debug;

use crate::criteria::Criteria;
use crate::errors::LocateError;
use crate::labels::NameIndex;

/// One line group of the listing.
#[derive(Debug, Clone, Serialize)]
pub struct ControlEntry {
    /// Depth below the dumped root (root = 0)
    pub depth: usize,
    pub summary: ElementSummary,
    pub labels: Vec<String>,
    pub criteria: Criteria,
}

/// Collect the entries for `root` and its descendants down to `max_depth`.
pub fn control_identifiers(
    root: &ElementRef,
    max_depth: Option<usize>,
) -> Result<Vec<ControlEntry>, LocateError> {
    let mut nodes: Vec<(ElementRef, usize)> = Vec::new();
    let mut stack = vec![(root.clone(), 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if max_depth.map_or(true, |max| depth < max) {
            match node.children() {
                Ok(children) => {
                    stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
                }
                Err(err) if depth == 0 => return Err(err.into()),
                Err(err) => debug!("skipping subtree of {:?}: {}", node, err),
            }
        }
        nodes.push((node, depth));
    }

    let elements: Vec<ElementRef> = nodes.iter().map(|(element, _)| element.clone()).collect();
    let index = NameIndex::build(&elements)?;

    nodes
        .into_iter()
        .enumerate()
        .map(|(ordinal, (element, depth))| {
            Ok(ControlEntry {
                depth,
                summary: element.summary(),
                labels: index.labels_for(ordinal).into_iter().map(String::from).collect(),
                criteria: identifying_criteria(&element)?,
            })
        })
        .collect()
}

/// Criteria naming the element by its stable attributes
fn identifying_criteria(element: &ElementRef) -> ElementResult<Criteria> {
    let mut criteria = Criteria::new();
    let name = element.name()?;
    if !name.is_empty() {
        criteria = criteria.title(name);
    }
    if let Some(auto_id) = element.automation_id()?.filter(|id| !id.is_empty()) {
        criteria = criteria.auto_id(auto_id);
    }
    criteria = match element.control_type()? {
        Some(control_type) if !control_type.is_empty() => criteria.control_type(control_type),
        _ => criteria.class_name(element.class_name()?),
    };
    Ok(criteria)
}

/// Render entries as an indented text listing
pub fn render(entries: &[ControlEntry]) -> String {
    let mut out = String::from("Control Identifiers:\n");
    for entry in entries {
        let prefix = "   | ".repeat(entry.depth);
        let _ = writeln!(out, "{prefix}");
        let _ = writeln!(out, "{prefix}{}", entry.summary);
        let labels: Vec<String> = entry.labels.iter().map(|label| format!("{label:?}")).collect();
        let _ = writeln!(out, "{prefix}[{}]", labels.join(", "));
        let _ = writeln!(out, "{prefix}{}", entry.criteria);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use souldesk_element::{MemoryTree, NativeId, NodeSpec};

    fn tree() -> MemoryTree {
        MemoryTree::from_spec(NodeSpec::new("#32769").child(
            NodeSpec::window("#32770", "Save As").with_id("dlg").children([
                NodeSpec::control("Edit", "")
                    .with_id("name")
                    .automation_id("1001")
                    .child(NodeSpec::control("Text", "hint").with_id("hint")),
                NodeSpec::control("Button", "Save").with_id("save"),
            ]),
        ))
        .unwrap()
    }

    #[test]
    fn test_entries_are_depth_first() {
        let tree = tree();
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();
        let entries = control_identifiers(&dialog, None).unwrap();

        let order: Vec<(&str, usize)> = entries
            .iter()
            .map(|entry| (entry.summary.native_id.as_str(), entry.depth))
            .collect();
        assert_eq!(order, vec![("dlg", 0), ("name", 1), ("hint", 2), ("save", 1)]);

        let save = &entries[3];
        assert!(save.labels.contains(&"Save".to_string()));
        assert_eq!(save.criteria.to_string(), "title=\"Save\", control_type=\"Button\"");
        assert_eq!(
            entries[1].criteria.to_string(),
            "control_type=\"Edit\", auto_id=\"1001\""
        );
    }

    #[test]
    fn test_depth_limit_and_render() {
        let tree = tree();
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();
        let entries = control_identifiers(&dialog, Some(1)).unwrap();
        assert_eq!(entries.len(), 3);

        let text = render(&entries);
        assert!(text.starts_with("Control Identifiers:"));
        assert!(text.contains("   | Button - 'Save'"));
        assert!(!text.contains("hint"));
    }

    #[test]
    fn test_stale_root_fails() {
        let tree = tree();
        let dialog = tree.element(&NativeId::from("dlg")).unwrap();
        tree.remove(&NativeId::from("dlg")).unwrap();
        assert!(control_identifiers(&dialog, None)
            .unwrap_err()
            .is_invalid_reference());
    }
}
