use crate::resolver::Decline;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;
use tuya_envelope::EnvelopeError;

/// Failures of a single pipeline run.
///
/// Every stage keeps its own variant so callers can branch on [`Error::kind`], e.g. to show
/// a permission hint for a 403 instead of a generic decryption failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("no strategy produced a download url{}", DisplayDeclines(.declines))]
    NoStrategySucceeded { declines: Vec<Decline> },

    #[error("download failed{}: {message}{}", DisplayStatus(.status), DisplayHint(.status))]
    DownloadFailed {
        status: Option<StatusCode>,
        message: String,
    },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Flat classification of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPayload,
    NoStrategySucceeded,
    DownloadFailed,
    EnvelopeTooSmall,
    HeaderMismatch,
    InvalidKeyLength,
    CiphertextNotBlockAligned,
    PaddingInvalid,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPayload(_) => ErrorKind::InvalidPayload,
            Self::NoStrategySucceeded { .. } => ErrorKind::NoStrategySucceeded,
            Self::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Self::Envelope(x) => match x {
                EnvelopeError::TooSmall { .. } => ErrorKind::EnvelopeTooSmall,
                EnvelopeError::HeaderMismatch { .. } => ErrorKind::HeaderMismatch,
                EnvelopeError::InvalidKeyLength { .. } => ErrorKind::InvalidKeyLength,
                EnvelopeError::CiphertextNotBlockAligned { .. } => {
                    ErrorKind::CiphertextNotBlockAligned
                }
                EnvelopeError::PaddingInvalid => ErrorKind::PaddingInvalid,
            },
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status of a failed download, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::DownloadFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// True for the private bucket / missing authorization case.
    pub fn is_access_denied(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }

    pub(crate) fn invalid_payload<T: Into<String>>(reason: T) -> Self {
        Self::InvalidPayload(reason.into())
    }
}

struct DisplayDeclines<'a>(&'a [Decline]);

impl fmt::Display for DisplayDeclines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(" (no strategies configured)");
        }

        for decline in self.0 {
            write!(f, "\n  {}: {}", decline.strategy, decline.reason)?;
        }

        Ok(())
    }
}

struct DisplayStatus<'a>(&'a Option<StatusCode>);

impl fmt::Display for DisplayStatus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(status) => write!(f, " (HTTP {})", status.as_u16()),
            None => Ok(()),
        }
    }
}

struct DisplayHint<'a>(&'a Option<StatusCode>);

impl fmt::Display for DisplayHint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self.0 == Some(StatusCode::FORBIDDEN) {
            f.write_str(
                ". The bucket is probably private: use the signed-url strategy with valid \
                 api credentials, or check that the region matches the bucket",
            )?;
        }

        Ok(())
    }
}

/// A `Result` alias where the `Err` case is `tuyadl::Error`.
pub type Result<T> = std::result::Result<T, Error>;
