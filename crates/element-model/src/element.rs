//! Backend-neutral element handle
//!
//! [`ElementInfo`] is the capability contract every backend implements;
//! [`ElementRef`] is the cheap, clonable handle the locator passes around.
//! Equality of handles is identity of the native reference, never attribute values.

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use souldesk_core_types::{NativeId, ProcessId, Rect};
use tracing::debug;

use crate::errors::ElementResult;

/// Per-node predicate supplied by callers of [`ElementInfo::descendants`].
pub type NodeFilter<'a> = &'a (dyn Fn(&ElementRef) -> bool + 'a);

/// Options for a breadth-first subtree walk.
#[derive(Clone, Copy, Default)]
pub struct WalkOptions<'a> {
    /// Maximum depth below the walk root (1 = immediate children). `None` walks everything.
    pub max_depth: Option<usize>,

    /// Only nodes accepted by the filter are returned; rejected nodes are still descended into.
    pub filter: Option<NodeFilter<'a>>,
}

impl<'a> WalkOptions<'a> {
    pub fn depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: NodeFilter<'a>) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Capability surface a backend exposes for one live element.
///
/// Getters never fail for a live element. Once the element is gone they fail
/// with [`ElementError::InvalidReference`](crate::ElementError::InvalidReference).
/// Reads must not mutate the element.
pub trait ElementInfo: Send + Sync {
    /// Name of the backend that produced this element
    fn backend(&self) -> &str;

    /// Native reference; identity of the element
    fn native_id(&self) -> &NativeId;

    fn name(&self) -> ElementResult<String>;

    fn class_name(&self) -> ElementResult<String>;

    fn control_type(&self) -> ElementResult<Option<String>>;

    fn automation_id(&self) -> ElementResult<Option<String>> {
        Ok(None)
    }

    fn control_id(&self) -> ElementResult<Option<i64>> {
        Ok(None)
    }

    fn process_id(&self) -> ElementResult<ProcessId>;

    fn is_visible(&self) -> ElementResult<bool>;

    fn is_enabled(&self) -> ElementResult<bool>;

    fn rectangle(&self) -> ElementResult<Rect>;

    fn parent(&self) -> ElementResult<Option<ElementRef>>;

    /// Immediate children, in backend order
    fn children(&self) -> ElementResult<Vec<ElementRef>>;

    fn is_alive(&self) -> bool;

    /// Breadth-first walk below this element.
    ///
    /// A failure listing this element's own children propagates; descendants that
    /// vanish mid-walk are skipped.
    fn descendants(&self, options: WalkOptions<'_>) -> ElementResult<Vec<ElementRef>> {
        if options.max_depth == Some(0) {
            return Ok(Vec::new());
        }
        let first_level = self.children()?;
        Ok(walk_breadth_first(first_level, options))
    }
}

/// Shared breadth-first walk used by the default `descendants` implementation.
pub fn walk_breadth_first(first_level: Vec<ElementRef>, options: WalkOptions<'_>) -> Vec<ElementRef> {
    let mut found = Vec::new();
    let mut queue: VecDeque<(ElementRef, usize)> =
        first_level.into_iter().map(|child| (child, 1)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        let accepted = options.filter.map_or(true, |filter| filter(&node));
        if accepted {
            found.push(node.clone());
        }

        if options.max_depth.map_or(true, |max| depth < max) {
            match node.children() {
                Ok(children) => {
                    queue.extend(children.into_iter().map(|child| (child, depth + 1)));
                }
                Err(err) => {
                    debug!("skipping subtree of {:?}: {}", node, err);
                }
            }
        }
    }

    found
}

/// Clonable handle to one element. Never owns the underlying OS object.
#[derive(Clone)]
pub struct ElementRef {
    inner: Arc<dyn ElementInfo>,
}

impl ElementRef {
    pub fn new<E: ElementInfo + 'static>(info: E) -> Self {
        Self {
            inner: Arc::new(info),
        }
    }

    /// Friendly class: the control type when the backend reports one, else the class name
    pub fn friendly_class_name(&self) -> ElementResult<String> {
        match self.control_type()? {
            Some(control_type) if !control_type.is_empty() => Ok(control_type),
            _ => self.class_name(),
        }
    }

    /// Walk up to the ancestor whose parent is the desktop root.
    ///
    /// Returns `self` for top-level elements and for the root itself.
    pub fn top_level_parent(&self) -> ElementResult<ElementRef> {
        let mut current = self.clone();
        loop {
            let Some(parent) = current.parent()? else {
                return Ok(current);
            };
            if parent.parent()?.is_none() {
                return Ok(current);
            }
            current = parent;
        }
    }

    /// Best-effort attribute snapshot for diagnostics; unreadable fields fall back to defaults.
    pub fn summary(&self) -> ElementSummary {
        ElementSummary {
            backend: self.backend().to_string(),
            native_id: self.native_id().to_string(),
            name: self.name().unwrap_or_default(),
            class_name: self.class_name().unwrap_or_default(),
            control_type: self.control_type().unwrap_or_default(),
            automation_id: self.automation_id().unwrap_or_default(),
            process_id: self.process_id().map(|pid| pid.0).unwrap_or_default(),
            rect: self.rectangle().unwrap_or_default(),
            visible: self.is_visible().unwrap_or(false),
            enabled: self.is_enabled().unwrap_or(false),
            alive: self.is_alive(),
        }
    }
}

impl Deref for ElementRef {
    type Target = dyn ElementInfo;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.backend() == other.backend() && self.native_id() == other.native_id()
    }
}

impl Eq for ElementRef {}

impl Hash for ElementRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backend().hash(state);
        self.native_id().hash(state);
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementRef({}:{})", self.backend(), self.native_id())
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Serializable attribute snapshot of an element, used in errors and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub backend: String,
    pub native_id: String,
    pub name: String,
    pub class_name: String,
    pub control_type: Option<String>,
    pub automation_id: Option<String>,
    pub process_id: u32,
    pub rect: Rect,
    pub visible: bool,
    pub enabled: bool,
    pub alive: bool,
}

impl fmt::Display for ElementSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.control_type.as_deref().unwrap_or(&self.class_name);
        write!(f, "{} - '{}' [{}] {}", class, self.name, self.native_id, self.rect)?;
        if !self.alive {
            write!(f, " <dead>")?;
        }
        Ok(())
    }
}
