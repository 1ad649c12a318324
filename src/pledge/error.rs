//! Error taxonomy for the pledge engine.
//!
//! Every failure of [`enter`](super::enter) maps to exactly one variant, and
//! every variant maps to an errno class so callers that speak the C contract
//! (`0` / `-1` + `errno`) can translate without losing the kind.

#[cfg(unix)]
use nix::errno::Errno;
use thiserror::Error;

/// Failure of a pledge request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PledgeError {
    /// A promise name that is not part of the promise vocabulary.
    #[error("unknown promise: {0:?}")]
    UnknownPromise(String),

    /// A granted promise has no policy translation on this backend.
    #[error("promise {0} is not supported by the seatbelt backend")]
    UnsupportedPromise(String),

    /// The compiled profile would not fit the fixed policy buffer.
    #[error("compiled sandbox profile exceeds {limit} bytes")]
    PolicyTooLarge { limit: usize },

    /// A profile is already enforced; it can never be replaced.
    #[error("sandbox is already active")]
    AlreadyActive,

    /// The request grants a promise the recorded mask already dropped.
    #[error("promise {0} was already dropped and cannot be regained")]
    PromiseEscalation(String),

    /// The activation hook could not be resolved and enforcement was required.
    #[error("sandbox_init_with_parameters is not available on this system")]
    PrimitiveUnavailable,

    /// The kernel refused the compiled profile.
    /// The platform diagnostic is logged, not carried here.
    #[error("sandbox activation rejected (rc={code})")]
    ActivationRejected { code: i32, errno: Option<i32> },

    /// A profile parameter could not be passed to the platform.
    #[error("invalid profile parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl PledgeError {
    /// Stable snake-case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownPromise(_) => "unknown_promise",
            Self::UnsupportedPromise(_) => "unsupported_promise",
            Self::PolicyTooLarge { .. } => "policy_too_large",
            Self::AlreadyActive => "already_active",
            Self::PromiseEscalation(_) => "promise_escalation",
            Self::PrimitiveUnavailable => "primitive_unavailable",
            Self::ActivationRejected { .. } => "activation_rejected",
            Self::InvalidParameter { .. } => "invalid_parameter",
        }
    }

    /// The errno class reported to C-style callers.
    #[cfg(unix)]
    pub fn errno(&self) -> Errno {
        match self {
            Self::UnknownPromise(_) | Self::InvalidParameter { .. } => Errno::EINVAL,
            Self::UnsupportedPromise(_) => Errno::ENOSYS,
            Self::PolicyTooLarge { .. } => Errno::ENOMEM,
            Self::AlreadyActive | Self::PromiseEscalation(_) => Errno::EPERM,
            Self::PrimitiveUnavailable => Errno::ENOTSUP,
            Self::ActivationRejected { errno, .. } => match errno.map(Errno::from_raw) {
                // Classes owned by other kinds collapse so the errno stays unambiguous.
                None
                | Some(
                    Errno::UnknownErrno | Errno::EINVAL | Errno::ENOSYS | Errno::ENOMEM | Errno::ENOTSUP,
                ) => Errno::EPERM,
                Some(errno) => errno,
            },
        }
    }
}
