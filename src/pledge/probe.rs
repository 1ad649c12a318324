//! Capability probe for the seatbelt activation hook.
//!
//! `sandbox_init_with_parameters` lives in `libsystem_sandbox` without a
//! public header and may be missing on some OS releases, so it is resolved at
//! runtime instead of being linked. Resolution happens once per process.

use std::ffi::c_char;
use std::sync::OnceLock;

use serde::Serialize;

/// Name of the activation hook.
pub const PRIMITIVE_SYMBOL: &str = "sandbox_init_with_parameters";

/// Name of the hook releasing activation error buffers.
pub const FREE_ERROR_SYMBOL: &str = "sandbox_free_error";

pub(crate) type SandboxInitWithParametersFn = unsafe extern "C" fn(
    profile: *const c_char,
    flags: u64,
    parameters: *const *const c_char,
    errorbuf: *mut *mut c_char,
) -> libc::c_int;

pub(crate) type SandboxFreeErrorFn = unsafe extern "C" fn(errorbuf: *mut c_char);

/// Resolved entry points. Both must be present for the hook to count as
/// available, so an error buffer can always be released.
#[derive(Clone, Copy)]
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) struct SeatbeltSymbols {
    pub init: SandboxInitWithParametersFn,
    pub free_error: SandboxFreeErrorFn,
}

static SYMBOLS: OnceLock<Option<SeatbeltSymbols>> = OnceLock::new();

pub(crate) fn symbols() -> Option<SeatbeltSymbols> {
    *SYMBOLS.get_or_init(resolve)
}

/// Whether the activation hook resolved. Memoized for the process lifetime.
pub fn is_available() -> bool {
    symbols().is_some()
}

#[cfg(target_os = "macos")]
fn resolve() -> Option<SeatbeltSymbols> {
    let init = lookup(c"sandbox_init_with_parameters")?;
    let free_error = lookup(c"sandbox_free_error")?;

    tracing::debug!("resolved {} and {}", PRIMITIVE_SYMBOL, FREE_ERROR_SYMBOL);

    // SAFETY: both symbols come from libsystem_sandbox and have had these
    // signatures since the API appeared.
    unsafe {
        Some(SeatbeltSymbols {
            init: std::mem::transmute::<*mut libc::c_void, SandboxInitWithParametersFn>(init),
            free_error: std::mem::transmute::<*mut libc::c_void, SandboxFreeErrorFn>(free_error),
        })
    }
}

#[cfg(target_os = "macos")]
fn lookup(name: &std::ffi::CStr) -> Option<*mut libc::c_void> {
    // SAFETY: `name` is NUL-terminated and RTLD_DEFAULT searches the images
    // already loaded into the process.
    let address = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) };
    if address.is_null() {
        tracing::debug!("{} did not resolve", name.to_string_lossy());
        None
    } else {
        Some(address)
    }
}

#[cfg(not(target_os = "macos"))]
fn resolve() -> Option<SeatbeltSymbols> {
    None
}

/// Snapshot of the probe for status output.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub platform: &'static str,
    pub primitive: &'static str,
    pub available: bool,
}

/// Probe the current system.
pub fn detect() -> CapabilityReport {
    CapabilityReport {
        platform: std::env::consts::OS,
        primitive: PRIMITIVE_SYMBOL,
        available: is_available(),
    }
}

impl CapabilityReport {
    /// Human-readable status lines for `sbpledge status`.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("  Platform:  {}", self.platform)];
        if self.available {
            lines.push(format!("  Seatbelt:  {:<32} ok", self.primitive));
        } else {
            lines.push(format!("  Seatbelt:  {:<32} --", "not available"));
            lines.push("  Pledges are recorded but not enforced (best-effort).".to_string());
        }
        lines
    }
}
