//! Error classification shared by both drivers.
//!
//! Driver errors are split into two classes. A [`Severity::Fatal`] error means the
//! transport itself failed, or an internal invariant was broken, and the call produced
//! no result. A [`Severity::Warning`] means a transfer completed with fewer bytes than
//! required; the caller decides whether to retry.

use std::fmt;

/// How serious a driver error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable condition, usually a partial transfer.
    Warning,
    /// The call failed outright.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Fatal => write!(f, "error"),
        }
    }
}

/// What went wrong, independent of the device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport rejected an address select, write or read.
    Io,
    /// A transfer moved fewer bytes than required.
    PartialIo,
    /// A configured poll limit ran out before the device reported ready.
    Timeout,
    /// A value that cannot occur after a valid construction was observed.
    InvalidState,
    /// The caller invoked an operation out of order or with mismatched arguments.
    Usage,
}

/// Implemented by driver error types so that they can be recorded in a [`Status`].
pub trait Classify: fmt::Display {
    /// Broad category of the error.
    fn kind(&self) -> ErrorKind;

    /// Severity derived from the category.
    fn severity(&self) -> Severity {
        match self.kind() {
            ErrorKind::PartialIo | ErrorKind::Timeout => Severity::Warning,
            ErrorKind::Io | ErrorKind::InvalidState | ErrorKind::Usage => Severity::Fatal,
        }
    }
}

/// A recorded error: its severity, category and human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Error detail attached to a device handle for later inspection.
///
/// Successful calls leave the previous fault in place; use [`Status::clear`] to reset.
#[derive(Debug, Clone, Default)]
pub struct Status {
    last: Option<Fault>,
}

impl Status {
    /// The most recent fault, if any.
    pub fn last(&self) -> Option<&Fault> {
        self.last.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.last.is_none()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Records `error` as the most recent fault.
    pub fn record<E: Classify>(&mut self, error: &E) {
        let fault = Fault {
            severity: error.severity(),
            kind: error.kind(),
            message: error.to_string(),
        };

        match fault.severity {
            Severity::Warning => tracing::warn!(kind = ?fault.kind, "{}", fault.message),
            Severity::Fatal => tracing::error!(kind = ?fault.kind, "{}", fault.message),
        }

        self.last = Some(fault);
    }

    /// Records the error of `result`, if any, and passes the result through.
    pub fn track<T, E: Classify>(&mut self, result: Result<T, E>) -> Result<T, E> {
        if let Err(error) = &result {
            self.record(error);
        }
        result
    }
}
