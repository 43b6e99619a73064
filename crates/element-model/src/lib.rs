//! Backend-neutral element model
//!
//! - [`ElementInfo`] / [`ElementRef`]: uniform handle to one GUI element
//! - [`Backend`] / [`BackendRegistry`]: technology accessors selected by name
//! - [`MemoryTree`] / [`MemoryBackend`]: controllable in-memory element tree

pub mod backend;
pub mod element;
pub mod errors;
pub mod memory;

pub use backend::*;
pub use element::*;
pub use errors::*;
pub use memory::{MemoryBackend, MemoryElement, MemoryTree, NodeProps, NodeSpec, MEMORY_BACKEND};

pub use souldesk_core_types::{NativeId, ProcessId, Rect};
