//! Per-process sandbox state machine.
//!
//! A process moves `Unpledged -> Pledged -> Active` and never backwards.
//! `Pledged` means a mask is recorded; `Active` means a compiled profile was
//! accepted by the kernel. All transitions happen under one lock, so
//! concurrent callers observe a single activation.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::activator::{ActivationPrimitive, SeatbeltPrimitive};
use super::error::PledgeError;
use super::profile::{self, PROCESS_PATH_PARAM, ProfileCompiler};
use super::promises::{PromiseMask, bit_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    Unpledged,
    Pledged,
    Active,
}

/// What to do when the activation hook is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enforcement {
    /// Record the mask, log a warning and report success.
    #[default]
    BestEffort,
    /// Fail with [`PledgeError::PrimitiveUnavailable`].
    Required,
}

impl std::str::FromStr for Enforcement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-effort" => Ok(Self::BestEffort),
            "required" => Ok(Self::Required),
            other => Err(format!(
                "invalid enforcement {other:?} (expected \"best-effort\" or \"required\")"
            )),
        }
    }
}

impl std::fmt::Display for Enforcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BestEffort => "best-effort",
            Self::Required => "required",
        })
    }
}

/// Point-in-time view of a [`Sandbox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStatus {
    pub state: SandboxState,
    pub mask: PromiseMask,
    pub enforced: bool,
}

#[derive(Debug)]
struct Record {
    state: SandboxState,
    mask: PromiseMask,
}

/// Pledge engine over an activation primitive.
pub struct Sandbox<P> {
    primitive: P,
    compiler: ProfileCompiler,
    process_path: Option<PathBuf>,
    record: Mutex<Record>,
}

impl<P: ActivationPrimitive> Sandbox<P> {
    /// Engine for the running executable.
    pub fn new(primitive: P) -> Self {
        Self::build(primitive, resolve_process_path())
    }

    /// Engine that confines exec to `process_path`.
    pub fn with_process_path(primitive: P, process_path: impl Into<PathBuf>) -> Self {
        Self::build(primitive, Some(process_path.into()))
    }

    fn build(primitive: P, process_path: Option<PathBuf>) -> Self {
        Self {
            primitive,
            compiler: ProfileCompiler::new(),
            process_path,
            record: Mutex::new(Record {
                state: SandboxState::Unpledged,
                mask: PromiseMask::DENY_ALL,
            }),
        }
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: ProfileCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn process_path(&self) -> Option<&Path> {
        self.process_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        // a panicking holder cannot leave a half-applied transition behind
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `mask` and, if the platform allows, enforce it.
    ///
    /// `mode` is accepted for call compatibility and otherwise ignored.
    pub fn enter(
        &self,
        mask: PromiseMask,
        mode: i32,
        enforcement: Enforcement,
    ) -> Result<(), PledgeError> {
        let mut record = self.lock();
        debug!(
            mask = format_args!("{:#018x}", mask.bits()),
            mode,
            %enforcement,
            "pledge requested"
        );

        if record.state == SandboxState::Active {
            warn!("pledge refused: sandbox already active");
            return Err(PledgeError::AlreadyActive);
        }

        profile::validate(mask)?;

        if record.state == SandboxState::Pledged
            && let Some(bit) = mask.first_escalation_over(record.mask)
        {
            return Err(PledgeError::PromiseEscalation(bit_name(bit)));
        }

        record.mask = mask;
        record.state = SandboxState::Pledged;

        if !self.primitive.is_available() {
            return match enforcement {
                Enforcement::BestEffort => {
                    warn!(
                        promises = %mask,
                        "seatbelt activation is not available; promises recorded but not enforced"
                    );
                    Ok(())
                }
                Enforcement::Required => Err(PledgeError::PrimitiveUnavailable),
            };
        }

        let process_path =
            self.process_path
                .as_deref()
                .ok_or_else(|| PledgeError::InvalidParameter {
                    name: PROCESS_PATH_PARAM.to_string(),
                    reason: "executable path could not be resolved".to_string(),
                })?;

        let policy = self.compiler.compile(mask, process_path)?;
        debug!(bytes = policy.len(), "compiled profile:\n{}", policy.as_str());

        self.primitive.activate(&policy)?;

        record.state = SandboxState::Active;
        info!(promises = %mask, "sandbox active");
        Ok(())
    }

    pub fn state(&self) -> SandboxState {
        self.lock().state
    }

    /// Whether a profile is actually in force.
    pub fn is_enforced(&self) -> bool {
        self.state() == SandboxState::Active
    }

    pub fn status(&self) -> SandboxStatus {
        let record = self.lock();
        SandboxStatus {
            state: record.state,
            mask: record.mask,
            enforced: record.state == SandboxState::Active,
        }
    }
}

/// The running executable, canonicalized when possible.
fn resolve_process_path() -> Option<PathBuf> {
    match std::env::current_exe() {
        Ok(path) => Some(std::fs::canonicalize(&path).unwrap_or(path)),
        Err(e) => {
            warn!("Failed to resolve current executable: {}", e);
            None
        }
    }
}

static GLOBAL: LazyLock<Sandbox<SeatbeltPrimitive>> =
    LazyLock::new(|| Sandbox::new(SeatbeltPrimitive));

/// The process-wide engine.
pub fn global() -> &'static Sandbox<SeatbeltPrimitive> {
    &GLOBAL
}

/// Pledge the calling process, degrading to a logged no-op when seatbelt is
/// missing.
pub fn enter(mask: PromiseMask, mode: i32) -> Result<(), PledgeError> {
    GLOBAL.enter(mask, mode, Enforcement::BestEffort)
}

/// Like [`enter`], but a missing activation hook is an error.
pub fn enter_strict(mask: PromiseMask, mode: i32) -> Result<(), PledgeError> {
    GLOBAL.enter(mask, mode, Enforcement::Required)
}

/// Raw form of [`enter`] for callers that speak errno.
#[cfg(unix)]
pub fn enter_raw(ipromises: u64, mode: i32) -> Result<(), nix::errno::Errno> {
    enter(PromiseMask::from_raw(ipromises), mode).map_err(|e| e.errno())
}

/// Parse a promise string such as `"stdio rpath"` and pledge it.
pub fn pledge(promises: &str) -> Result<(), PledgeError> {
    enter(promises.parse()?, 0)
}

pub fn state() -> SandboxState {
    GLOBAL.state()
}

pub fn is_enforced() -> bool {
    GLOBAL.is_enforced()
}

pub fn status() -> SandboxStatus {
    GLOBAL.status()
}
