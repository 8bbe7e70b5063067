use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedReadError {
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not download feed from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Could not extract feed archive '{path}': {message}")]
    Archive { path: PathBuf, message: String },
    #[error("Could not parse {file_name}: {source}")]
    Csv {
        file_name: String,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid GTFS dataset: {0}")]
    Gtfs(#[from] gtfs_structures::Error),
    #[error("Feed location '{0}' is neither a file nor a directory")]
    NotFound(String),
    #[error("Error joining feed reading task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

macro_rules! io_err {
    ($path:expr, $err:expr) => {
        crate::gtfs_import::errors::FeedReadError::Io {
            path: $path.to_path_buf(),
            source: $err,
        }
    };
}

pub(crate) use io_err;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One validation result. `row_index` starts at 1 and is `None` for
/// dataset-wide findings such as a missing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    pub dataset: String,
    pub row_index: Option<usize>,
}

impl Finding {
    pub fn error(message: impl Into<String>, dataset: &str, row_index: Option<usize>) -> Self {
        Finding {
            severity: Severity::Error,
            message: message.into(),
            dataset: dataset.to_string(),
            row_index,
        }
    }

    pub fn warning(message: impl Into<String>, dataset: &str, row_index: Option<usize>) -> Self {
        Finding {
            severity: Severity::Warning,
            message: message.into(),
            dataset: dataset.to_string(),
            row_index,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row_index {
            Some(row) => write!(
                f,
                "{}: {} ({} row {})",
                self.severity, self.message, self.dataset, row
            ),
            None => write!(f, "{}: {} ({})", self.severity, self.message, self.dataset),
        }
    }
}

fn summarize(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|finding| finding.to_string())
        .collect::<Vec<String>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum GtfsFeedImporterError {
    #[error("Could not read GTFS feed: {0}")]
    Read(#[from] FeedReadError),
    #[error("GTFS feed validation failed: {}", summarize(.0))]
    Validation(Vec<Finding>),
    #[error(
        "Something fishy going on! Trying to use default agency but there are {count} agencies in the feed."
    )]
    AmbiguousDefaultAgency { count: usize },
    #[error("{file_name} row {row_index}: unknown {column} '{value}'")]
    UnresolvedReference {
        file_name: String,
        row_index: usize,
        column: &'static str,
        value: String,
    },
    #[error("Invalid field mapping: {0}")]
    Mapping(String),
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}
