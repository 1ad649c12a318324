//! OpenBSD-style pledge for macOS.
//!
//! A process declares the promises it still needs (`stdio`, `rpath`, `inet`,
//! ...) and everything else is denied from then on. Promises are compiled to
//! a Seatbelt (SBPL) profile that starts with `(deny default)` and adds allow
//! rules only; the profile is applied with `sandbox_init_with_parameters`.
//!
//! Where that hook is missing, [`enter`] records the promises, logs a warning
//! and succeeds without enforcement. [`enter_strict`] fails instead, and
//! [`is_enforced`] tells the two outcomes apart.

pub mod activator;
pub mod child;
mod error;
pub mod executor;
pub mod probe;
pub mod profile;
pub mod promises;
pub mod report;
pub mod state;

pub use activator::{ActivationPrimitive, SeatbeltPrimitive};
pub use child::probe_child_main;
pub use error::PledgeError;
pub use executor::{PROBE_ARG0, run_probe, run_probe_with};
pub use probe::{CapabilityReport, detect};
pub use profile::{PolicyText, ProfileCompiler, SBPL_MAX_SIZE, compile};
pub use promises::{Promise, PromiseMask};
pub use report::{ProbeReport, ProbeRequest};
#[cfg(unix)]
pub use state::enter_raw;
pub use state::{
    Enforcement, Sandbox, SandboxState, SandboxStatus, enter, enter_strict, is_enforced, pledge,
    state, status,
};
