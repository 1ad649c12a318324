//! The boundary between a compiled profile and the kernel.

use super::error::PledgeError;
use super::profile::PolicyText;
use super::probe;

/// Applies a compiled profile to the calling process.
///
/// Activation is irreversible: once `activate` returns `Ok`, the profile
/// stays in force until the process exits.
#[cfg_attr(test, mockall::automock)]
pub trait ActivationPrimitive {
    /// Whether the platform hook can be called at all.
    fn is_available(&self) -> bool;

    /// Hand `policy` and its parameters to the platform.
    fn activate(&self, policy: &PolicyText) -> Result<(), PledgeError>;
}

/// `sandbox_init_with_parameters`, resolved at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeatbeltPrimitive;

impl ActivationPrimitive for SeatbeltPrimitive {
    fn is_available(&self) -> bool {
        probe::is_available()
    }

    #[cfg(target_os = "macos")]
    fn activate(&self, policy: &PolicyText) -> Result<(), PledgeError> {
        seatbelt::activate(policy)
    }

    #[cfg(not(target_os = "macos"))]
    fn activate(&self, _policy: &PolicyText) -> Result<(), PledgeError> {
        Err(PledgeError::PrimitiveUnavailable)
    }
}

#[cfg(target_os = "macos")]
mod seatbelt {
    use std::ffi::{CStr, CString, c_char};
    use std::os::unix::ffi::OsStrExt;
    use std::ptr;

    use tracing::warn;

    use super::super::error::PledgeError;
    use super::super::probe::{self, SeatbeltSymbols};
    use super::super::profile::PolicyText;

    pub(super) fn activate(policy: &PolicyText) -> Result<(), PledgeError> {
        let symbols = probe::symbols().ok_or(PledgeError::PrimitiveUnavailable)?;

        let profile = CString::new(policy.as_str()).map_err(|e| PledgeError::InvalidParameter {
            name: "profile".to_string(),
            reason: e.to_string(),
        })?;

        // Flattened name/value pairs, NULL-terminated.
        let mut owned = Vec::with_capacity(policy.params().len() * 2);
        for (name, value) in policy.params() {
            let invalid = |e: std::ffi::NulError| PledgeError::InvalidParameter {
                name: (*name).to_string(),
                reason: e.to_string(),
            };
            owned.push(CString::new(*name).map_err(invalid)?);
            owned.push(CString::new(value.as_bytes()).map_err(invalid)?);
        }
        let mut parameters: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        parameters.push(ptr::null());

        let mut errorbuf: *mut c_char = ptr::null_mut();

        // A stale errno from earlier work must not be read as the rejection cause.
        nix::errno::Errno::clear();

        // SAFETY: every pointer refers to a live, NUL-terminated CString owned
        // by this frame, and the parameter array ends with NULL.
        let rc = unsafe { (symbols.init)(profile.as_ptr(), 0, parameters.as_ptr(), &mut errorbuf) };
        if rc == 0 {
            return Ok(());
        }

        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .filter(|raw| *raw != 0);
        match take_error(symbols, errorbuf) {
            Some(message) => warn!(rc, "sandbox_init_with_parameters failed: {}", message),
            None => warn!(rc, "sandbox_init_with_parameters failed"),
        }

        Err(PledgeError::ActivationRejected { code: rc, errno })
    }

    /// Copy the platform diagnostic and release its buffer.
    fn take_error(symbols: SeatbeltSymbols, errorbuf: *mut c_char) -> Option<String> {
        if errorbuf.is_null() {
            return None;
        }
        // SAFETY: a non-null error buffer is a C string allocated by the
        // sandbox library and owned by us until sandbox_free_error.
        let message = unsafe { CStr::from_ptr(errorbuf) }
            .to_string_lossy()
            .into_owned();
        unsafe { (symbols.free_error)(errorbuf) };
        Some(message)
    }
}
