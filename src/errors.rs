//! Error types shared by every module of the crate.

use std::io::Error as IOError;
use std::path::PathBuf;

use crate::line::LineState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        ErrorKind::InvalidArgument(msg.into()).into()
    }

    pub(crate) fn state(pin: u32, op: &'static str, state: LineState) -> Self {
        ErrorKind::State { pin, op, state }.into()
    }

    pub(crate) fn notify(err: IOError) -> Self {
        ErrorKind::Notify(err).into()
    }

    /// Attribute writes rejected by the kernel with `EINVAL` surface as
    /// [`ErrorKind::InvalidArgument`], everything else as [`ErrorKind::Io`].
    pub(crate) fn from_write(err: IOError, attribute: &str) -> Self {
        if err.kind() == std::io::ErrorKind::InvalidInput {
            Self::invalid_argument(format!("kernel rejected {attribute} value: {err}"))
        } else {
            err.into()
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("gpio{pin}: timed out waiting for {} ({stage})", .path.display())]
    HandshakeTimeout {
        pin: u32,
        path: PathBuf,
        stage: HandshakeStage,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(IOError),
    #[error("Notification mechanism failed: {0}")]
    Notify(IOError),
    #[error("gpio{pin}: cannot {op} while the line is {state}")]
    State {
        pin: u32,
        op: &'static str,
        state: LineState,
    },
}

/// How far the export handshake got before it ran out of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// The `gpio<N>` control directory never appeared.
    DirectoryMissing,
    /// The directory exists but a control file never appeared in it.
    FileMissing,
    /// The file exists but stayed unreadable or unwritable.
    NotAccessible(nix::Error),
}

impl std::fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeStage::DirectoryMissing => f.write_str("control directory missing"),
            HandshakeStage::FileMissing => f.write_str("control file missing"),
            HandshakeStage::NotAccessible(errno) => write!(f, "not accessible: {errno}"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<IOError> for Error {
    fn from(err: IOError) -> Self {
        ErrorKind::Io(err).into()
    }
}
