// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::result;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    MissingFile,
    StreamIsNull,
    StreamNotReadable,
    BadManifest,
    UnterminatedQuote,
    MalformedRecord,
    UnclosedRecord,
    UnclosedTable,
    ExpectedNumber,
    ExpectedDateTime,
    UnresolvedReference,
    Generic,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            MissingFile => "missing_file",
            StreamIsNull => "stream_is_null",
            StreamNotReadable => "stream_not_readable",
            BadManifest => "bad_manifest",
            UnterminatedQuote => "unterminated_quote",
            MalformedRecord => "malformed_record",
            UnclosedRecord => "unclosed_record",
            UnclosedTable => "unclosed_table",
            ExpectedNumber => "expected_number",
            ExpectedDateTime => "expected_datetime",
            UnresolvedReference => "unresolved_reference",
            Generic => "generic",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Import,
    Format,
    Build,
}

/// A fatal error: aborts the current import pass, never the whole host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Import => "import",
            ErrorKind::Format => "format",
            ErrorKind::Build => "build",
        };
        match &self.details {
            Some(details) => write!(f, "{}: {} -- {}", kind, self.code, details),
            None => write!(f, "{}: {}", kind, self.code),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! import_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Import,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! format_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Format,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

/// One problem found during an import pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", severity, self.message)
    }
}

/// Accumulates non-fatal problems across a whole import pass so the caller
/// can report them as one batch instead of interleaving log calls with the
/// work.  Local failures (bad record, dangling reference) land here;
/// anything fatal is an [`Error`] instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn<S: Into<String>>(&mut self, message: S) {
        self.events.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn info<S: Into<String>>(&mut self, message: S) {
        self.events.push(Diagnostic {
            severity: Severity::Info,
            message: message.into(),
        });
    }

    /// Collapses a list of excluded item ids into a single batched warning,
    /// so one import reports all of them together.
    pub fn warn_batch(&mut self, prefix: &str, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.warn(format!("{}: {}", prefix, ids.join(", ")));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}
