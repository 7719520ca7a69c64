//! Record and note-log domain model.
//!
//! # Responsibility
//! - Define the record shape shared by the store, search and access layers.
//! - Format new note entries and parse the persisted note text back.
//!
//! # Invariants
//! - `identifier` is non-empty after trim.
//! - A note entry always serializes to exactly one line.
//! - Appending to a `NoteLog` never rewrites earlier lines.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Timestamp layout used inside serialized note lines.
pub const NOTE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

static NOTE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2})\] \((?P<author>.*?)\): (?P<body>.*)$")
        .expect("valid note line regex")
});
static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\r\n]+\s*").expect("valid line break regex"));

/// Validation errors for record and note input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyIdentifier,
    EmptyAuthor,
    EmptyBody,
    DuplicateIdentifier(String),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "record identifier must not be empty"),
            Self::EmptyAuthor => write!(f, "note author must not be empty"),
            Self::EmptyBody => write!(f, "note body must not be empty"),
            Self::DuplicateIdentifier(identifier) => {
                write!(f, "a record with identifier `{identifier}` already exists")
            }
        }
    }
}

impl Error for RecordValidationError {}

/// One stored subject: identifier, display name and note history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Lookup key. Expected unique within a store.
    pub identifier: String,
    /// Human label, not unique, may be empty.
    pub display_name: String,
    /// Append-only note history.
    pub notes: NoteLog,
    /// Additional persisted columns, carried through unchanged on rewrite.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record with an empty note log.
    ///
    /// `identifier` and `display_name` are trimmed.
    pub fn new(
        identifier: impl AsRef<str>,
        display_name: impl AsRef<str>,
    ) -> Result<Self, RecordValidationError> {
        let identifier = identifier.as_ref().trim();
        if identifier.is_empty() {
            return Err(RecordValidationError::EmptyIdentifier);
        }

        Ok(Self {
            identifier: identifier.to_string(),
            display_name: display_name.as_ref().trim().to_string(),
            notes: NoteLog::default(),
            extra: BTreeMap::new(),
        })
    }

    /// Whole-string, case-insensitive identifier comparison used to target
    /// mutations.
    pub fn has_identifier(&self, identifier: &str) -> bool {
        identifiers_match(&self.identifier, identifier)
    }
}

/// Compares a stored identifier with a requested one.
///
/// Both sides are trimmed and compared case-insensitively. A blank stored
/// identifier never matches anything.
pub fn identifiers_match(stored: &str, requested: &str) -> bool {
    let stored = stored.trim();
    !stored.is_empty() && stored.to_lowercase() == requested.trim().to_lowercase()
}

/// A single timestamped note, created only through the append path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry {
    timestamp: NaiveDateTime,
    author: String,
    body: String,
}

impl NoteEntry {
    /// Builds an entry from raw input.
    ///
    /// Surrounding whitespace is trimmed and inner line breaks collapse to a
    /// single space, so the serialized entry stays on one line.
    ///
    /// # Errors
    /// - `EmptyAuthor` / `EmptyBody` when the trimmed value is empty.
    pub fn new(
        timestamp: NaiveDateTime,
        author: &str,
        body: &str,
    ) -> Result<Self, RecordValidationError> {
        let author = single_line(author);
        if author.is_empty() {
            return Err(RecordValidationError::EmptyAuthor);
        }
        let body = single_line(body);
        if body.is_empty() {
            return Err(RecordValidationError::EmptyBody);
        }

        Ok(Self {
            timestamp: truncate_to_minute(timestamp),
            author,
            body,
        })
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Renders `"[<timestamp>] (<author>): <body>"`.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] ({}): {}",
            self.timestamp.format(NOTE_TIMESTAMP_FORMAT),
            self.author,
            self.body
        )
    }

    /// Parses one serialized line. Returns `None` for free-form text.
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = NOTE_LINE_RE.captures(line.trim())?;
        let timestamp =
            NaiveDateTime::parse_from_str(&caps["timestamp"], NOTE_TIMESTAMP_FORMAT).ok()?;
        let author = caps["author"].trim();
        let body = caps["body"].trim();
        if author.is_empty() || body.is_empty() {
            return None;
        }

        Some(Self {
            timestamp,
            author: author.to_string(),
            body: body.to_string(),
        })
    }
}

impl Display for NoteEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// One line of a parsed note log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteLine {
    /// Line written by the append path.
    Entry(NoteEntry),
    /// Text that does not follow the entry layout, e.g. hand-edited cells.
    Text(String),
}

/// Newline-joined note history as stored in the notes column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteLog(String);

impl NoteLog {
    /// Wraps persisted note text. Absent cells map to an empty log.
    pub fn from_stored(text: Option<String>) -> Self {
        Self(text.unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Appends one entry as a new line.
    ///
    /// Surrounding whitespace of the previous text is dropped; an empty log
    /// becomes exactly the new line.
    pub fn append(&mut self, entry: &NoteEntry) {
        let previous = self.0.trim();
        self.0 = if previous.is_empty() {
            entry.to_line()
        } else {
            format!("{previous}\n{}", entry.to_line())
        };
    }

    /// Parses the log into lines, oldest first. Blank lines are skipped.
    pub fn lines(&self) -> Vec<NoteLine> {
        self.0
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match NoteEntry::parse_line(line) {
                Some(entry) => NoteLine::Entry(entry),
                None => NoteLine::Text(line.to_string()),
            })
            .collect()
    }

    /// Returns only lines written by the append path.
    pub fn entries(&self) -> Vec<NoteEntry> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                NoteLine::Entry(entry) => Some(entry),
                NoteLine::Text(_) => None,
            })
            .collect()
    }
}

impl Display for NoteLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn single_line(value: &str) -> String {
    LINE_BREAK_RE.replace_all(value.trim(), " ").into_owned()
}

fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    let rendered = value.format(NOTE_TIMESTAMP_FORMAT).to_string();
    NaiveDateTime::parse_from_str(&rendered, NOTE_TIMESTAMP_FORMAT).unwrap_or(value)
}
