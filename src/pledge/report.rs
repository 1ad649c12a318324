//! Wire types exchanged with the `sbpledge-probe` child.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::PledgeError;
use super::state::SandboxState;

/// What the probe child should pledge and try afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// Promise string such as `"stdio rpath"`.
    #[serde(default)]
    pub promises: String,

    /// Raw inverted mask; takes precedence over `promises` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_mask: Option<u64>,

    /// Files opened for reading before and after pledging.
    #[serde(default)]
    pub open_paths: Vec<PathBuf>,

    /// Pledge a second time with the same mask.
    #[serde(default)]
    pub repeat: bool,

    /// Use `enter_strict` instead of `enter`.
    #[serde(default)]
    pub strict: bool,
}

impl ProbeRequest {
    pub fn new(promises: impl Into<String>) -> Self {
        Self {
            promises: promises.into(),
            raw_mask: None,
            open_paths: Vec::new(),
            repeat: false,
            strict: false,
        }
    }
}

/// Result of a single `enter` call as seen by the child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EnterOutcome {
    pub fn is_error(&self, kind: &str) -> bool {
        self.error_kind.as_deref() == Some(kind)
    }
}

impl From<&Result<(), PledgeError>> for EnterOutcome {
    fn from(result: &Result<(), PledgeError>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error_kind: None,
                message: None,
            },
            Err(e) => Self {
                ok: false,
                error_kind: Some(e.kind().to_string()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Attempt to open one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAttempt {
    pub path: PathBuf,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpenAttempt {
    pub fn try_open(path: PathBuf) -> Self {
        match std::fs::File::open(&path) {
            Ok(_) => Self {
                path,
                ok: true,
                error: None,
            },
            Err(e) => Self {
                path,
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Everything the child observed, printed as JSON on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub request: ProbeRequest,
    pub available: bool,
    pub opens_before: Vec<OpenAttempt>,
    pub enter: EnterOutcome,
    pub state: SandboxState,
    pub enforced: bool,
    pub opens_after: Vec<OpenAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_enter: Option<EnterOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_after_second: Option<SandboxState>,
}
