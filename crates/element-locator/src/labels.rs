//! Unique label generation
//!
//! Every element of a snapshot gets a few human-usable labels (name, friendly
//! class, name + class, neighbour text + class). Colliding labels are
//! disambiguated with ordinal suffixes so each key denotes exactly one element.

use std::collections::HashMap;

use souldesk_element::{ElementRef, ElementResult, Rect};

use crate::errors::LocateError;
use crate::fuzzy::clean_text;

/// Label -> element ordinal, for one snapshot of elements.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    elements: Vec<ElementRef>,
    entries: Vec<(String, usize)>,
    lookup: HashMap<String, usize>,
}

impl NameIndex {
    /// Build the index for `elements`, in the given (traversal) order
    pub fn build(elements: &[ElementRef]) -> Result<Self, LocateError> {
        let sources = elements
            .iter()
            .map(LabelSource::read)
            .collect::<ElementResult<Vec<_>>>()?;

        let mut index = NameIndex {
            elements: elements.to_vec(),
            ..NameIndex::default()
        };
        for ordinal in 0..sources.len() {
            for label in candidate_names(ordinal, &sources) {
                index.insert(label, ordinal);
            }
        }
        Ok(index)
    }

    fn insert(&mut self, label: String, ordinal: usize) {
        let Some(&holder) = self.lookup.get(&label) else {
            self.push(label, ordinal);
            return;
        };
        if holder == ordinal {
            return;
        }

        // first collision: the holder is also reachable as `<label>0` and `<label>1`
        let zero = format!("{label}0");
        if !self.lookup.contains_key(&zero) {
            self.push(zero, holder);
            let one = format!("{label}1");
            if !self.lookup.contains_key(&one) {
                self.push(one, holder);
            }
        }

        let mut counter = 2;
        let unique = loop {
            let candidate = format!("{label}{counter}");
            if !self.lookup.contains_key(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        self.push(unique, ordinal);
    }

    fn push(&mut self, label: String, ordinal: usize) {
        self.lookup.insert(label.clone(), ordinal);
        self.entries.push((label, ordinal));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }

    pub fn get(&self, label: &str) -> Option<&ElementRef> {
        self.ordinal(label).and_then(|ordinal| self.elements.get(ordinal))
    }

    pub fn ordinal(&self, label: &str) -> Option<usize> {
        self.lookup.get(label).copied()
    }

    /// `(label, ordinal)` pairs in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(label, ordinal)| (label.as_str(), *ordinal))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Labels of one element, in insertion order
    pub fn labels_for(&self, ordinal: usize) -> Vec<&str> {
        self.entries()
            .filter(|(_, owner)| *owner == ordinal)
            .map(|(label, _)| label)
            .collect()
    }
}

/// Attributes read once per element while labelling.
struct LabelSource {
    name: String,
    class: String,
    rect: Rect,
}

impl LabelSource {
    fn read(element: &ElementRef) -> ElementResult<Self> {
        Ok(Self {
            name: clean_text(&element.name()?).trim().to_string(),
            class: element.friendly_class_name()?,
            rect: element.rectangle()?,
        })
    }
}

fn candidate_names(ordinal: usize, sources: &[LabelSource]) -> Vec<String> {
    let source = &sources[ordinal];
    let mut names = Vec::with_capacity(3);

    if !source.class.is_empty() {
        names.push(source.class.clone());
    }
    if !source.name.is_empty() {
        names.push(source.name.clone());
        if !source.class.is_empty() {
            names.push(format!("{}{}", source.name, source.class));
        }
    } else if let Some(text) = neighbour_text(ordinal, sources) {
        names.push(format!("{}{}", text, source.class));
    }

    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

/// Text of the closest named element lying left of or above an unnamed one.
fn neighbour_text(ordinal: usize, sources: &[LabelSource]) -> Option<&str> {
    let target = &sources[ordinal].rect;
    if target.is_empty() {
        return None;
    }

    sources
        .iter()
        .enumerate()
        .filter(|(other, source)| {
            *other != ordinal && !source.name.is_empty() && !source.rect.is_empty()
        })
        .filter_map(|(_, source)| {
            let rect = &source.rect;
            let left_of = rect.right <= target.left && overlaps(rect.top, rect.bottom, target.top, target.bottom);
            let above = rect.bottom <= target.top && overlaps(rect.left, rect.right, target.left, target.right);
            if !left_of && !above {
                return None;
            }
            let distance = if left_of {
                distance((rect.right, rect.top), (target.left, target.top))
            } else {
                distance((rect.left, rect.bottom), (target.left, target.top))
            };
            Some((distance, source.name.as_str()))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name)
}

fn overlaps(start_a: i32, end_a: i32, start_b: i32, end_b: i32) -> bool {
    start_a < end_b && start_b < end_a
}

fn distance(a: (i32, i32), b: (i32, i32)) -> i64 {
    let dx = i64::from(a.0) - i64::from(b.0);
    let dy = i64::from(a.1) - i64::from(b.1);
    dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
}
