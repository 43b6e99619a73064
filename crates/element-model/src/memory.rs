//! In-memory element tree
//!
//! A fully controllable backend: trees are described with [`NodeSpec`] (in code,
//! JSON or YAML) and can be mutated while locators run against them, which is how
//! windows appearing late, disappearing or toggling state are reproduced.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use souldesk_core_types::{NativeId, ProcessId, Rect};
use tracing::{debug, info};

use crate::backend::{Backend, BackendCapabilities};
use crate::element::{ElementInfo, ElementRef};
use crate::errors::{ElementError, ElementResult};

pub const MEMORY_BACKEND: &str = "memory";

const DESKTOP_ID: &str = "desktop";

/// Declarative description of a node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub id: Option<String>,
    pub name: String,
    pub class_name: String,
    pub control_type: Option<String>,
    pub automation_id: Option<String>,
    pub control_id: Option<i64>,
    pub process_id: u32,
    pub visible: bool,
    pub enabled: bool,
    pub rect: [i32; 4],
    pub children: Vec<NodeSpec>,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            class_name: String::new(),
            control_type: None,
            automation_id: None,
            control_id: None,
            process_id: 0,
            visible: true,
            enabled: true,
            rect: [0, 0, 0, 0],
            children: Vec::new(),
        }
    }
}

impl NodeSpec {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    /// Window with a class name and a title
    pub fn window(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(class_name).named(name).control_type("Window")
    }

    /// Control whose class name and control type coincide (`Button`, `Edit`, ...)
    pub fn control(control_type: impl Into<String>, name: impl Into<String>) -> Self {
        let control_type = control_type.into();
        Self::new(control_type.clone())
            .named(name)
            .control_type(control_type)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn control_type(mut self, control_type: impl Into<String>) -> Self {
        self.control_type = Some(control_type.into());
        self
    }

    pub fn automation_id(mut self, automation_id: impl Into<String>) -> Self {
        self.automation_id = Some(automation_id.into());
        self
    }

    pub fn control_id(mut self, control_id: i64) -> Self {
        self.control_id = Some(control_id);
        self
    }

    pub fn process(mut self, process_id: u32) -> Self {
        self.process_id = process_id;
        self
    }

    pub fn rect(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        self.rect = [left, top, right, bottom];
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Mutable attributes of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProps {
    pub name: String,
    pub class_name: String,
    pub control_type: Option<String>,
    pub automation_id: Option<String>,
    pub control_id: Option<i64>,
    pub process_id: ProcessId,
    pub visible: bool,
    pub enabled: bool,
    pub rect: Rect,
}

impl From<&NodeSpec> for NodeProps {
    fn from(spec: &NodeSpec) -> Self {
        Self {
            name: spec.name.clone(),
            class_name: spec.class_name.clone(),
            control_type: spec.control_type.clone(),
            automation_id: spec.automation_id.clone(),
            control_id: spec.control_id,
            process_id: ProcessId(spec.process_id),
            visible: spec.visible,
            enabled: spec.enabled,
            rect: Rect::from(spec.rect),
        }
    }
}

struct Node {
    parent: Option<NativeId>,
    children: Vec<NativeId>,
    props: NodeProps,
}

struct TreeState {
    nodes: HashMap<NativeId, Node>,
    root: NativeId,
    next_id: u64,
}

impl TreeState {
    fn allocate_id(&mut self, requested: Option<&str>) -> ElementResult<NativeId> {
        let id = match requested {
            Some(raw) => NativeId::new(raw),
            None => loop {
                self.next_id += 1;
                let candidate = NativeId::new(format!("node-{}", self.next_id));
                if !self.nodes.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        if self.nodes.contains_key(&id) {
            return Err(ElementError::backend(
                MEMORY_BACKEND,
                format!("duplicate node id '{}'", id),
            ));
        }
        Ok(id)
    }

    /// Insert `spec` and its subtree; on failure nothing stays behind
    fn insert(&mut self, parent: Option<NativeId>, spec: &NodeSpec) -> ElementResult<NativeId> {
        let mut inserted = Vec::new();
        match self.insert_subtree(parent.clone(), spec, &mut inserted) {
            Ok(id) => Ok(id),
            Err(err) => {
                if let (Some(parent_id), Some(top)) = (&parent, inserted.first()) {
                    if let Some(parent_node) = self.nodes.get_mut(parent_id) {
                        parent_node.children.retain(|child| child != top);
                    }
                }
                for id in &inserted {
                    self.nodes.remove(id);
                }
                Err(err)
            }
        }
    }

    fn insert_subtree(
        &mut self,
        parent: Option<NativeId>,
        spec: &NodeSpec,
        inserted: &mut Vec<NativeId>,
    ) -> ElementResult<NativeId> {
        let id = self.allocate_id(spec.id.as_deref())?;
        inserted.push(id.clone());
        self.nodes.insert(
            id.clone(),
            Node {
                parent: parent.clone(),
                children: Vec::new(),
                props: NodeProps::from(spec),
            },
        );
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.push(id.clone());
            }
        }
        for child in &spec.children {
            self.insert_subtree(Some(id.clone()), child, inserted)?;
        }
        Ok(id)
    }

    fn remove_subtree(&mut self, id: &NativeId) -> usize {
        let Some(node) = self.nodes.remove(id) else {
            return 0;
        };
        1 + node
            .children
            .iter()
            .map(|child| self.remove_subtree(child))
            .sum::<usize>()
    }
}

/// Shared, thread-safe element tree. Clones observe the same tree.
#[derive(Clone)]
pub struct MemoryTree {
    state: Arc<RwLock<TreeState>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Tree holding only an empty desktop
    pub fn new() -> Self {
        let desktop = NodeSpec::new("#32769")
            .named("Desktop")
            .control_type("Pane")
            .with_id(DESKTOP_ID);
        Self::from_spec(desktop).unwrap_or_else(|_| unreachable!("empty desktop has unique ids"))
    }

    /// Build a tree whose root (the desktop) is `spec`
    pub fn from_spec(mut spec: NodeSpec) -> ElementResult<Self> {
        if spec.id.is_none() {
            spec.id = Some(DESKTOP_ID.to_string());
        }
        let mut state = TreeState {
            nodes: HashMap::new(),
            root: NativeId::new(DESKTOP_ID),
            next_id: 0,
        };
        state.root = state.insert(None, &spec)?;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Load a tree from a JSON or YAML file (chosen by extension)
    pub fn load(path: &Path) -> ElementResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ElementError::Load(format!("{}: {}", path.display(), err)))?;
        let spec: NodeSpec = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|err| ElementError::Load(format!("{}: {}", path.display(), err)))?,
            _ => serde_json::from_str(&content)
                .map_err(|err| ElementError::Load(format!("{}: {}", path.display(), err)))?,
        };
        let tree = Self::from_spec(spec)?;
        info!("Loaded element tree from {} ({} nodes)", path.display(), tree.len());
        Ok(tree)
    }

    pub fn root_id(&self) -> NativeId {
        self.state.read().root.clone()
    }

    pub fn root(&self) -> ElementRef {
        ElementRef::new(MemoryElement {
            tree: self.clone(),
            id: self.root_id(),
        })
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &NativeId) -> bool {
        self.state.read().nodes.contains_key(id)
    }

    /// Handle for an existing node
    pub fn element(&self, id: &NativeId) -> ElementResult<ElementRef> {
        if !self.contains(id) {
            return Err(ElementError::invalid_reference(MEMORY_BACKEND, id));
        }
        Ok(ElementRef::new(MemoryElement {
            tree: self.clone(),
            id: id.clone(),
        }))
    }

    /// Attach `spec` (and its subtree) as the last child of `parent`
    pub fn add(&self, parent: &NativeId, spec: NodeSpec) -> ElementResult<NativeId> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(parent) {
            return Err(ElementError::invalid_reference(MEMORY_BACKEND, parent));
        }
        let id = state.insert(Some(parent.clone()), &spec)?;
        debug!("Added node {} under {}", id, parent);
        Ok(id)
    }

    /// Attach a new top-level element under the desktop
    pub fn add_top_level(&self, spec: NodeSpec) -> ElementResult<NativeId> {
        let root = self.root_id();
        self.add(&root, spec)
    }

    /// Remove a node and its subtree; handles to them become invalid
    pub fn remove(&self, id: &NativeId) -> ElementResult<()> {
        let mut state = self.state.write();
        if *id == state.root {
            return Err(ElementError::backend(
                MEMORY_BACKEND,
                "the desktop cannot be removed",
            ));
        }
        let parent = match state.nodes.get(id) {
            Some(node) => node.parent.clone(),
            None => return Err(ElementError::invalid_reference(MEMORY_BACKEND, id)),
        };
        if let Some(parent_node) = parent.and_then(|parent_id| state.nodes.get_mut(&parent_id)) {
            parent_node.children.retain(|child| child != id);
        }
        let removed = state.remove_subtree(id);
        debug!("Removed node {} ({} nodes)", id, removed);
        Ok(())
    }

    /// Mutate a node's attributes in place
    pub fn update(&self, id: &NativeId, apply: impl FnOnce(&mut NodeProps)) -> ElementResult<()> {
        let mut state = self.state.write();
        let node = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| ElementError::invalid_reference(MEMORY_BACKEND, id))?;
        apply(&mut node.props);
        Ok(())
    }

    fn read<T>(&self, id: &NativeId, read: impl FnOnce(&Node) -> T) -> ElementResult<T> {
        let state = self.state.read();
        state
            .nodes
            .get(id)
            .map(read)
            .ok_or_else(|| ElementError::invalid_reference(MEMORY_BACKEND, id))
    }
}

/// One node of a [`MemoryTree`].
pub struct MemoryElement {
    tree: MemoryTree,
    id: NativeId,
}

impl MemoryElement {
    fn props<T>(&self, read: impl FnOnce(&NodeProps) -> T) -> ElementResult<T> {
        self.tree.read(&self.id, |node| read(&node.props))
    }
}

impl ElementInfo for MemoryElement {
    fn backend(&self) -> &str {
        MEMORY_BACKEND
    }

    fn native_id(&self) -> &NativeId {
        &self.id
    }

    fn name(&self) -> ElementResult<String> {
        self.props(|props| props.name.clone())
    }

    fn class_name(&self) -> ElementResult<String> {
        self.props(|props| props.class_name.clone())
    }

    fn control_type(&self) -> ElementResult<Option<String>> {
        self.props(|props| props.control_type.clone())
    }

    fn automation_id(&self) -> ElementResult<Option<String>> {
        self.props(|props| props.automation_id.clone())
    }

    fn control_id(&self) -> ElementResult<Option<i64>> {
        self.props(|props| props.control_id)
    }

    fn process_id(&self) -> ElementResult<ProcessId> {
        self.props(|props| props.process_id)
    }

    fn is_visible(&self) -> ElementResult<bool> {
        self.props(|props| props.visible)
    }

    fn is_enabled(&self) -> ElementResult<bool> {
        self.props(|props| props.enabled)
    }

    fn rectangle(&self) -> ElementResult<Rect> {
        self.props(|props| props.rect)
    }

    fn parent(&self) -> ElementResult<Option<ElementRef>> {
        let parent = self.tree.read(&self.id, |node| node.parent.clone())?;
        Ok(parent.map(|id| {
            ElementRef::new(MemoryElement {
                tree: self.tree.clone(),
                id,
            })
        }))
    }

    fn children(&self) -> ElementResult<Vec<ElementRef>> {
        let children = self.tree.read(&self.id, |node| node.children.clone())?;
        Ok(children
            .into_iter()
            .map(|id| {
                ElementRef::new(MemoryElement {
                    tree: self.tree.clone(),
                    id,
                })
            })
            .collect())
    }

    fn is_alive(&self) -> bool {
        self.tree.contains(&self.id)
    }
}

/// Backend serving a [`MemoryTree`].
#[derive(Clone)]
pub struct MemoryBackend {
    tree: MemoryTree,
}

impl MemoryBackend {
    pub fn new(tree: MemoryTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &MemoryTree {
        &self.tree
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        MEMORY_BACKEND
    }

    fn root(&self) -> ElementResult<ElementRef> {
        Ok(self.tree.root())
    }

    fn from_native(&self, id: &NativeId) -> ElementResult<ElementRef> {
        self.tree.element(id)
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            native_title_re: false,
        }
    }
}
