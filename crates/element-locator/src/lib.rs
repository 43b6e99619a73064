//! Element locator
//!
//! Finds GUI elements in the tree exposed by a [`Backend`](souldesk_element::Backend):
//! - **TreeSearch**: single-shot breadth-first search with structural criteria
//! - **FuzzyMatcher**: free-text lookup against generated unique labels
//! - **ResolutionSpec**: deferred, retrying resolution of a chain of criteria
//!
//! ```no_run
//! use std::sync::Arc;
//! use element_locator::{Criteria, Desktop};
//! use souldesk_element::{MemoryBackend, MemoryTree};
//!
//! let desktop = Desktop::new(Arc::new(MemoryBackend::new(MemoryTree::new())));
//! let ok = desktop
//!     .window(Criteria::new().title_re(".* - Notepad"))
//!     .append(Criteria::new().best_match("OK"))
//!     .resolve()?;
//! # Ok::<(), element_locator::LocateError>(())
//! ```

pub mod criteria;
pub mod desktop;
pub mod dump;
pub mod errors;
pub mod fuzzy;
pub mod labels;
pub mod search;
pub mod spec;
pub mod timings;

pub use criteria::{Criteria, ElementPredicate};
pub use desktop::Desktop;
pub use dump::{control_identifiers, render as render_identifiers, ControlEntry};
pub use errors::LocateError;
pub use fuzzy::{FuzzyMatcher, ScoredCandidate, TieBreak, DEFAULT_CUTOFF};
pub use labels::NameIndex;
pub use search::{TreeSearch, DEFAULT_MAX_DEPTH};
pub use spec::{Level, ResolutionReport, ResolutionSpec, ResolutionState, WaitFor};
pub use timings::Timings;
