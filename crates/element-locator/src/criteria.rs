//! Match criteria for element search
//!
//! A [`Criteria`] is a value: builders consume and return it, and a
//! [`ResolutionSpec`](crate::ResolutionSpec) stores its own copy per level.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use souldesk_element::{Backend, ElementRef, ElementResult, NativeId};
use tracing::debug;

use crate::errors::LocateError;

/// Escape hatch: arbitrary test over an element
pub type ElementPredicate = Arc<dyn Fn(&ElementRef) -> bool + Send + Sync>;

/// Named set of match predicates. Every field is optional.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Criteria {
    /// Exact element name
    pub title: Option<String>,

    /// Full-string regex over the element name
    pub title_re: Option<String>,

    pub class_name: Option<String>,

    /// Full-string regex over the class name
    pub class_name_re: Option<String>,

    pub control_type: Option<String>,

    pub control_id: Option<i64>,

    pub auto_id: Option<String>,

    /// Owning process id
    pub process: Option<u32>,

    /// Raw native reference; bypasses the tree walk
    pub handle: Option<NativeId>,

    /// Search immediate children of the root only. Unset: true from the desktop,
    /// false under an explicit root.
    pub top_level_only: Option<bool>,

    /// Unset: true
    pub visible_only: Option<bool>,

    /// Unset: false
    pub enabled_only: Option<bool>,

    /// Walk depth below the root when not top-level only
    pub depth: Option<usize>,

    /// Free-text name resolved with the fuzzy matcher
    pub best_match: Option<String>,

    /// Pick the nth match instead of failing on ambiguity
    pub found_index: Option<usize>,

    #[serde(skip)]
    pub predicate: Option<ElementPredicate>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn title_re(mut self, pattern: impl Into<String>) -> Self {
        self.title_re = Some(pattern.into());
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn class_name_re(mut self, pattern: impl Into<String>) -> Self {
        self.class_name_re = Some(pattern.into());
        self
    }

    pub fn control_type(mut self, control_type: impl Into<String>) -> Self {
        self.control_type = Some(control_type.into());
        self
    }

    pub fn control_id(mut self, control_id: i64) -> Self {
        self.control_id = Some(control_id);
        self
    }

    pub fn auto_id(mut self, auto_id: impl Into<String>) -> Self {
        self.auto_id = Some(auto_id.into());
        self
    }

    pub fn process(mut self, process_id: u32) -> Self {
        self.process = Some(process_id);
        self
    }

    pub fn handle(mut self, handle: impl Into<NativeId>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn top_level_only(mut self, top_level_only: bool) -> Self {
        self.top_level_only = Some(top_level_only);
        self
    }

    pub fn visible_only(mut self, visible_only: bool) -> Self {
        self.visible_only = Some(visible_only);
        self
    }

    pub fn enabled_only(mut self, enabled_only: bool) -> Self {
        self.enabled_only = Some(enabled_only);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn best_match(mut self, query: impl Into<String>) -> Self {
        self.best_match = Some(query.into());
        self
    }

    pub fn found_index(mut self, index: usize) -> Self {
        self.found_index = Some(index);
        self
    }

    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ElementRef) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// No discriminating field set (flags and indexes do not discriminate)
    pub fn is_empty(&self) -> bool {
        !self.has_structural_filter() && self.best_match.is_none()
    }

    /// Only a free-text name identifies the element
    pub fn is_name_only(&self) -> bool {
        self.best_match.is_some() && !self.has_structural_filter()
    }

    fn has_structural_filter(&self) -> bool {
        self.title.is_some()
            || self.title_re.is_some()
            || self.class_name.is_some()
            || self.class_name_re.is_some()
            || self.control_type.is_some()
            || self.control_id.is_some()
            || self.auto_id.is_some()
            || self.process.is_some()
            || self.handle.is_some()
            || self.predicate.is_some()
    }

    /// Compile-and-test convenience; searches compile once per call instead
    pub fn matches(&self, backend: &dyn Backend, element: &ElementRef) -> Result<bool, LocateError> {
        let compiled = CompiledCriteria::compile(self)?;
        Ok(compiled.matches(backend, element)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocateError> {
        fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, LocateError> {
            value
                .parse::<T>()
                .map_err(|_| LocateError::InvalidCriteria(format!("bad value for {key}: '{value}'")))
        }

        let text = || Some(value.to_string());
        match key {
            "title" => self.title = text(),
            "title_re" => self.title_re = text(),
            "class_name" => self.class_name = text(),
            "class_name_re" => self.class_name_re = text(),
            "control_type" => self.control_type = text(),
            "control_id" => self.control_id = Some(parse(key, value)?),
            "auto_id" => self.auto_id = text(),
            "process" => self.process = Some(parse(key, value)?),
            "handle" => self.handle = Some(NativeId::new(value)),
            "top_level_only" => self.top_level_only = Some(parse(key, value)?),
            "visible_only" => self.visible_only = Some(parse(key, value)?),
            "enabled_only" => self.enabled_only = Some(parse(key, value)?),
            "depth" => self.depth = Some(parse(key, value)?),
            "best_match" => self.best_match = text(),
            "found_index" => self.found_index = Some(parse(key, value)?),
            other => {
                return Err(LocateError::InvalidCriteria(format!(
                    "unknown criteria key '{other}'"
                )))
            }
        }
        Ok(())
    }
}

/// Parses `key=value` pairs separated by commas. Values containing commas are
/// written in double quotes: `title="Save, then close",control_type=Button`.
/// Inside quotes `\"` and `\\` stand for a quote and a backslash, matching what
/// `Display` prints.
impl FromStr for Criteria {
    type Err = LocateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut criteria = Criteria::new();
        for pair in split_pairs(s)? {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                LocateError::InvalidCriteria(format!("expected key=value, got '{pair}'"))
            })?;
            criteria.set(key.trim(), &unquote(value.trim()))?;
        }
        Ok(criteria)
    }
}

fn split_pairs(input: &str) -> Result<Vec<String>, LocateError> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quoted => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ',' if !quoted => {
                if !current.trim().is_empty() {
                    pairs.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if quoted {
        return Err(LocateError::InvalidCriteria(format!(
            "unterminated quote in '{input}'"
        )));
    }
    if !current.trim().is_empty() {
        pairs.push(current.trim().to_string());
    }
    Ok(pairs)
}

/// Strip surrounding quotes and resolve escapes; bare values are taken literally
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut quoted = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                parts.push(format!("{key}={}", quote(value)));
            }
        };
        quoted("title", &self.title);
        quoted("title_re", &self.title_re);
        quoted("class_name", &self.class_name);
        quoted("class_name_re", &self.class_name_re);
        quoted("control_type", &self.control_type);
        quoted("auto_id", &self.auto_id);
        quoted("best_match", &self.best_match);
        if let Some(control_id) = self.control_id {
            parts.push(format!("control_id={control_id}"));
        }
        if let Some(process) = self.process {
            parts.push(format!("process={process}"));
        }
        if let Some(handle) = &self.handle {
            parts.push(format!("handle={}", quote(handle.as_str())));
        }
        if let Some(top_level_only) = self.top_level_only {
            parts.push(format!("top_level_only={top_level_only}"));
        }
        if let Some(visible_only) = self.visible_only {
            parts.push(format!("visible_only={visible_only}"));
        }
        if let Some(enabled_only) = self.enabled_only {
            parts.push(format!("enabled_only={enabled_only}"));
        }
        if let Some(depth) = self.depth {
            parts.push(format!("depth={depth}"));
        }
        if let Some(found_index) = self.found_index {
            parts.push(format!("found_index={found_index}"));
        }
        if self.predicate.is_some() {
            parts.push("predicate=<fn>".to_string());
        }
        if parts.is_empty() {
            f.write_str("<any element>")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

impl fmt::Debug for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Criteria({self})")
    }
}

/// Criteria with regexes compiled once per search.
pub(crate) struct CompiledCriteria<'a> {
    criteria: &'a Criteria,
    title_re: Option<Regex>,
    class_name_re: Option<Regex>,
}

impl<'a> CompiledCriteria<'a> {
    pub(crate) fn compile(criteria: &'a Criteria) -> Result<Self, LocateError> {
        Ok(Self {
            criteria,
            title_re: criteria.title_re.as_deref().map(full_match).transpose()?,
            class_name_re: criteria.class_name_re.as_deref().map(full_match).transpose()?,
        })
    }

    /// Conjunction of every structural predicate
    pub(crate) fn matches(&self, backend: &dyn Backend, element: &ElementRef) -> ElementResult<bool> {
        let criteria = self.criteria;

        if criteria.visible_only.unwrap_or(true) && !element.is_visible()? {
            return Ok(false);
        }
        if criteria.enabled_only.unwrap_or(false) && !element.is_enabled()? {
            return Ok(false);
        }
        if criteria.class_name.is_some() || self.class_name_re.is_some() {
            let class_name = element.class_name()?;
            if criteria.class_name.as_deref().is_some_and(|wanted| wanted != class_name) {
                return Ok(false);
            }
            if self.class_name_re.as_ref().is_some_and(|re| !re.is_match(&class_name)) {
                return Ok(false);
            }
        }
        if let Some(wanted) = &criteria.control_type {
            if element.control_type()?.as_deref() != Some(wanted.as_str()) {
                return Ok(false);
            }
        }
        if let Some(wanted) = criteria.control_id {
            if element.control_id()? != Some(wanted) {
                return Ok(false);
            }
        }
        if let Some(wanted) = &criteria.auto_id {
            if element.automation_id()?.as_deref() != Some(wanted.as_str()) {
                return Ok(false);
            }
        }
        if let Some(wanted) = criteria.process {
            if element.process_id()?.0 != wanted {
                return Ok(false);
            }
        }
        if let Some(wanted) = &criteria.title {
            if element.name()? != *wanted {
                return Ok(false);
            }
        }
        if let Some(pattern) = &self.title_re {
            if !backend.title_matches(element, pattern)? {
                return Ok(false);
            }
        }
        if let Some(predicate) = &criteria.predicate {
            if !predicate(element) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Walk filter: read failures on a vanishing node count as a mismatch
    pub(crate) fn accepts(&self, backend: &dyn Backend, element: &ElementRef) -> bool {
        match self.matches(backend, element) {
            Ok(accepted) => accepted,
            Err(err) => {
                debug!("rejecting {:?}: {}", element, err);
                false
            }
        }
    }
}

fn full_match(pattern: &str) -> Result<Regex, LocateError> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|err| LocateError::InvalidCriteria(format!("bad regex '{pattern}': {err}")))
}
