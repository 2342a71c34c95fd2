//! # Cache Keys
//!
//! A cache key is a `(prefix, postfix)` pair. The postfix names a response
//! category (`all_events`, `free_rooms`, ...); the prefix is the concatenation
//! of the query parameters that distinguish one response from another.
//!
//! ```text
//! compose("2024-10-07_2024-10-13", "all_events") -> "2024-10-07_2024-10-13_all_events"
//! compose("", "all_events")                      -> "all_events"
//! pattern("2024-10-07_2024-10-13", "all_events") -> "*2024-10-07_2024-10-13_all_events*"
//! pattern("", "all_events")                      -> "*all_events*"
//! ```
//!
//! No normalisation or escaping is applied. Callers that put glob
//! metacharacters (`*`, `?`, `[`) into a prefix widen their own invalidation
//! pattern.

use std::fmt;

const SEPARATOR: char = '_';

/// Compose the stored key for a prefix and postfix
pub fn compose(prefix: &str, postfix: &str) -> String {
    if prefix.is_empty() {
        postfix.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{postfix}")
    }
}

/// Wildcard pattern selecting every key that contains the composed key
pub fn invalidation_pattern(prefix: &str, postfix: &str) -> String {
    format!("*{}*", compose(prefix, postfix))
}

/// Logical cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: String,
    postfix: String,
}

impl CacheKey {
    pub fn new(prefix: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            postfix: postfix.into(),
        }
    }

    /// Key for one of the calendar categories
    pub fn for_category(prefix: impl Into<String>, category: Category) -> Self {
        Self::new(prefix, category.as_str())
    }

    /// Key with an empty prefix, covering the whole category on invalidation
    pub fn category(category: Category) -> Self {
        Self::new("", category.as_str())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn postfix(&self) -> &str {
        &self.postfix
    }

    /// Stored key string
    pub fn compose(&self) -> String {
        compose(&self.prefix, &self.postfix)
    }

    /// Glob used by pattern invalidation
    pub fn pattern(&self) -> String {
        invalidation_pattern(&self.prefix, &self.postfix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.postfix)
        } else {
            write!(f, "{}{SEPARATOR}{}", self.prefix, self.postfix)
        }
    }
}

/// Response categories of the calendar service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    AllEvents,
    FreeRooms,
    AllCalendar,
    GetTimeBlock,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::AllEvents,
        Category::FreeRooms,
        Category::AllCalendar,
        Category::GetTimeBlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllEvents => "all_events",
            Self::FreeRooms => "free_rooms",
            Self::AllCalendar => "all_calendar",
            Self::GetTimeBlock => "get_time_block",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a prefix from the query parameters that distinguish a response.
///
/// ```
/// use calendar_cache::key::KeyPrefix;
///
/// let prefix = KeyPrefix::new()
///     .part("2024-10-07")
///     .part("2024-10-13")
///     .part("RoomA")
///     .build();
/// assert_eq!(prefix, "2024-10-07_2024-10-13_RoomA");
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyPrefix {
    parts: Vec<String>,
}

impl KeyPrefix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: impl fmt::Display) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Add a part only when present; absent query parameters are skipped
    pub fn optional(self, part: Option<impl fmt::Display>) -> Self {
        match part {
            Some(part) => self.part(part),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        self.parts.join(&SEPARATOR.to_string())
    }

    pub fn key(&self, category: Category) -> CacheKey {
        CacheKey::for_category(self.build(), category)
    }
}

const CALENDAR_CATEGORIES: &[&str] = &[
    "all_events",
    "free_rooms",
    "all_calendar",
    "get_time_block",
];

/// Fixed set of postfixes invalidated together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    postfixes: Vec<String>,
}

impl Namespace {
    pub fn new<I, S>(postfixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            postfixes: postfixes.into_iter().map(Into::into).collect(),
        }
    }

    /// The calendar namespace: every category a booking change can affect
    pub fn calendar() -> Self {
        Self::new(CALENDAR_CATEGORIES.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.postfixes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.postfixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postfixes.is_empty()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::calendar()
    }
}
