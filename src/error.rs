use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Aggregated validation failures, rendered as an indented tree.
///
/// Lines and keyed sections keep insertion order. Empty sections are never
/// recorded, so a section only shows up when one of its members failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorTree {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Line(String),
    Section(String, ErrorTree),
}

impl ErrorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(Entry::Line(line.into()));
    }

    /// Nest `tree` under `key`, skipping it when it holds no errors.
    pub fn section(&mut self, key: impl Into<String>, tree: ErrorTree) {
        if !tree.is_empty() {
            self.entries.push(Entry::Section(key.into(), tree));
        }
    }

    /// Nest the error side of `result` under `key`.
    pub fn section_result(&mut self, key: impl Into<String>, result: Result<(), ErrorTree>) {
        if let Err(tree) = result {
            self.section(key, tree);
        }
    }

    /// Append the entries of `other` at this level.
    pub fn extend(&mut self, other: ErrorTree) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_result(self) -> Result<(), ErrorTree> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Rendered lines, two spaces of indentation per nesting level.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        lines
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        for entry in &self.entries {
            match entry {
                Entry::Line(line) => lines.push(format!("{indent}{line}")),
                Entry::Section(key, tree) => {
                    lines.push(format!("{indent}{key}:"));
                    tree.render_into(depth + 1, lines);
                }
            }
        }
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

impl std::error::Error for ErrorTree {}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config failed validity check:\n{0}")]
    Invalid(ErrorTree),
}

/// Failure of a single version query.
///
/// The message formats are operator-facing; control flow uses [`QueryError::kind`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("regex {pattern:?} didn't return any matches on {target:?}")]
    RegexNoMatch { pattern: String, target: String },

    #[error("regex {pattern:?} is invalid: {source}")]
    RegexInvalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed converting {version:?} to a semantic version")]
    SemanticVersion { version: String },

    #[error("queried version {queried:?} is less than the current version {current:?}")]
    QueriedVersionOlder { queried: String, current: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("json {path:?} failed on response from {url}: {details}")]
    Json {
        path: String,
        url: String,
        details: String,
    },

    #[error("no version found in response from {url}")]
    Empty { url: String },
}

/// Classification driving the per-service liveness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    RegexExtraction,
    SemverComparison,
    VersionBelowCurrent,
    Generic,
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::RegexNoMatch { .. } | QueryError::RegexInvalid { .. } => {
                QueryErrorKind::RegexExtraction
            }
            QueryError::SemanticVersion { .. } => QueryErrorKind::SemverComparison,
            QueryError::QueriedVersionOlder { .. } => QueryErrorKind::VersionBelowCurrent,
            QueryError::Http(_)
            | QueryError::Status { .. }
            | QueryError::Json { .. }
            | QueryError::Empty { .. } => QueryErrorKind::Generic,
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("values failed validity check:\n{0}")]
    Invalid(ErrorTree),

    #[error(transparent)]
    Query(#[from] QueryError),
}
