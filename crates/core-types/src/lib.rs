use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error raised when parsing a primitive from its textual form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid rectangle '{0}': expected four comma separated integers")]
    Rect(String),
    #[error("invalid process id '{0}'")]
    ProcessId(String),
}

/// Technology-specific reference to a live element (window handle, runtime id, node key).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub String);

impl NativeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for NativeId {
    fn from(handle: u64) -> Self {
        Self(format!("{handle:#x}"))
    }
}

impl From<&str> for NativeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl FromStr for ProcessId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(ProcessId)
            .map_err(|_| ParseError::ProcessId(s.to_string()))
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Screen rectangle of an element in desktop coordinates.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in `i64`; extreme edges from a backend cannot overflow
    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Reading order: top edge first, then left edge.
    pub fn reading_order(&self, other: &Rect) -> Ordering {
        self.top
            .cmp(&other.top)
            .then_with(|| self.left.cmp(&other.left))
    }

    /// True when `self` lies above or to the left of `other`, judged by its top-left corner.
    pub fn is_above_or_left_of(&self, other: &Rect) -> bool {
        self.reading_order(other) == Ordering::Less
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(L{}, T{}, R{}, B{})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

impl FromStr for Rect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseError::Rect(s.to_string()))?;
        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Rect::new(*left, *top, *right, *bottom)),
            _ => Err(ParseError::Rect(s.to_string())),
        }
    }
}

impl From<[i32; 4]> for Rect {
    fn from(value: [i32; 4]) -> Self {
        Rect::new(value[0], value[1], value[2], value[3])
    }
}
