//! Seatbelt profile compiler: promise mask → SBPL text.
//!
//! Profiles start with `(deny default)` and only ever add `allow` rules, so a
//! compile that stops early can under-grant but never over-grant. The
//! executable path is not inlined; it is referenced as the `PROCESS_PATH`
//! parameter and substituted by the platform at activation time.

use std::ffi::OsString;
use std::path::Path;

use super::error::PledgeError;
use super::promises::{Promise, PromiseMask, bit_name};

/// Hard ceiling for profile text, including the trailing NUL.
pub const SBPL_MAX_SIZE: usize = 4096;

/// Name of the parameter carrying the resolved executable path.
pub const PROCESS_PATH_PARAM: &str = "PROCESS_PATH";

const PROFILE_HEADER: &str = r#";; pledge() promises compiled for seatbelt
(version 1)
(deny default)

;; self re-execution only
(allow process-exec (literal (param "PROCESS_PATH")))
"#;

/// Rules granted by each translated promise. Promises missing here are
/// rejected at compile time.
const TRANSLATIONS: &[(Promise, &str)] = &[
    (
        Promise::Stdio,
        r#"(allow file-read* file-write*
  (literal "/dev/stdin" "/dev/stdout" "/dev/stderr"
           "/dev/null" "/dev/zero" "/dev/urandom"
           "/dev/random" "/dev/dtracehelper"))
(allow sysctl-read)
(allow process-fork)
(allow mach-lookup
  (global-name "com.apple.system.logger"
               "com.apple.system.notification_center"))
(allow mach-priv-host-port)
"#,
    ),
    (Promise::Rpath, "(allow file-read*)\n"),
    (Promise::Wpath, "(allow file-write-data)\n"),
    (Promise::Cpath, "(allow file-write-create file-write-unlink)\n"),
    (
        Promise::Fattr,
        "(allow file-write-mode file-write-times file-write-flags file-write-xattr)\n",
    ),
    (
        Promise::Inet,
        r#"(allow system-socket)
(allow network-outbound (remote ip))
(allow network-inbound (local ip))
(allow network-bind (local ip))
"#,
    ),
    (
        Promise::Unix,
        r#"(allow system-socket)
(allow network-outbound (remote unix-socket))
(allow network-inbound (local unix-socket))
(allow network-bind (local unix-socket))
"#,
    ),
    (
        Promise::Dns,
        r#"(allow system-socket)
(allow file-read*
  (literal "/etc/hosts" "/private/etc/hosts"
           "/etc/resolv.conf" "/private/var/run/resolv.conf"
           "/etc/services" "/private/etc/services"))
(allow network-outbound (literal "/private/var/run/mDNSResponder"))
(allow mach-lookup (global-name "com.apple.dnssd.service"))
"#,
    ),
    (
        Promise::Tty,
        r##"(allow file-read* file-write* file-ioctl
  (literal "/dev/tty")
  (regex #"^/dev/ttys[0-9]+$"))
"##,
    ),
    (
        Promise::Proc,
        r#"(allow process-fork)
(allow signal)
(allow process-info*)
"#,
    ),
    (Promise::Exec, "(allow process-exec)\n"),
    (Promise::ProtExec, "(allow file-map-executable)\n"),
    (
        Promise::Vminfo,
        r#"(allow sysctl-read
  (sysctl-name-prefix "vm.")
  (sysctl-name-prefix "kern.proc."))
(allow process-info-listpids process-info-pidinfo)
"#,
    ),
    (
        Promise::Tmppath,
        r#"(allow file-read* file-write*
  (subpath "/tmp")
  (subpath "/private/tmp")
  (subpath "/private/var/folders"))
"#,
    ),
];

/// SBPL rules for a promise, if this backend can express it.
pub fn translation(promise: Promise) -> Option<&'static str> {
    TRANSLATIONS
        .iter()
        .find(|(candidate, _)| *candidate == promise)
        .map(|(_, rules)| *rules)
}

pub fn is_supported(promise: Promise) -> bool {
    translation(promise).is_some()
}

/// Reject masks granting anything without a translation.
pub fn validate(mask: PromiseMask) -> Result<(), PledgeError> {
    for bit in mask.granted_bits() {
        let supported = Promise::from_bit(bit).is_some_and(is_supported);
        if !supported {
            return Err(PledgeError::UnsupportedPromise(bit_name(bit)));
        }
    }
    Ok(())
}

/// Compiled profile text and the parameters it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyText {
    text: String,
    params: Vec<(&'static str, OsString)>,
}

impl PolicyText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Named parameters, in the order they are passed to the platform.
    pub fn params(&self) -> &[(&'static str, OsString)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&OsString> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Output buffer that refuses to grow past its bound.
struct BoundedBuffer {
    text: String,
    limit: usize,
}

impl BoundedBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, chunk: &str) -> Result<(), PledgeError> {
        // one byte stays free for the NUL terminator
        if self.text.len() + chunk.len() >= self.limit {
            return Err(PledgeError::PolicyTooLarge { limit: self.limit });
        }
        self.text.push_str(chunk);
        Ok(())
    }
}

/// Translates promise masks into seatbelt profiles.
#[derive(Debug, Clone, Copy)]
pub struct ProfileCompiler {
    limit: usize,
}

impl ProfileCompiler {
    pub fn new() -> Self {
        Self {
            limit: SBPL_MAX_SIZE,
        }
    }

    /// Compiler with a custom buffer bound.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Compile `mask` into a profile whose `PROCESS_PATH` parameter is
    /// `process_path`.
    pub fn compile(
        &self,
        mask: PromiseMask,
        process_path: &Path,
    ) -> Result<PolicyText, PledgeError> {
        validate(mask)?;

        let mut out = BoundedBuffer::new(self.limit);
        out.push(PROFILE_HEADER)?;

        for promise in mask.granted() {
            if let Some(rules) = translation(promise) {
                out.push(&format!("\n;; {promise}\n"))?;
                out.push(rules)?;
            }
        }

        Ok(PolicyText {
            text: out.text,
            params: vec![(PROCESS_PATH_PARAM, process_path.as_os_str().to_owned())],
        })
    }
}

impl Default for ProfileCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile with the default [`SBPL_MAX_SIZE`] bound.
pub fn compile(mask: PromiseMask, process_path: &Path) -> Result<PolicyText, PledgeError> {
    ProfileCompiler::new().compile(mask, process_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXE: &str = "/usr/local/bin/sbpledge-test";

    fn supported_mask() -> PromiseMask {
        let supported: Vec<Promise> = Promise::ALL
            .iter()
            .copied()
            .filter(|p| is_supported(*p))
            .collect();
        PromiseMask::granting(&supported)
    }

    #[test]
    fn stdio_profile_starts_with_default_deny() {
        let mask = PromiseMask::granting(&[Promise::Stdio]);
        let policy = compile(mask, Path::new(EXE)).unwrap();
        let rules: Vec<&str> = policy
            .as_str()
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('('))
            .collect();

        assert_eq!(rules[0], "(version 1)");
        assert_eq!(rules[1], "(deny default)");
        assert!(policy.as_str().contains("\"/dev/stdout\""));
        assert!(policy.as_str().contains("(allow sysctl-read)"));
    }

    #[test]
    fn only_additive_rules_after_header() {
        let policy = compile(supported_mask(), Path::new(EXE)).unwrap();
        let rules: Vec<&str> = policy
            .as_str()
            .lines()
            .filter(|line| line.starts_with('('))
            .skip(2)
            .collect();
        assert!(!rules.is_empty());
        for rule in rules {
            assert!(rule.starts_with("(allow "), "non-additive rule: {rule}");
        }
        assert_eq!(policy.as_str().matches("(deny").count(), 1);
    }

    #[test]
    fn process_path_is_a_parameter_not_a_literal() {
        let policy = compile(PromiseMask::granting(&[Promise::Stdio]), Path::new(EXE)).unwrap();
        assert!(
            policy
                .as_str()
                .contains("(allow process-exec (literal (param \"PROCESS_PATH\")))")
        );
        assert!(!policy.as_str().contains(EXE));
        assert_eq!(
            policy.param(PROCESS_PATH_PARAM),
            Some(&OsString::from(EXE))
        );
        assert_eq!(policy.params().len(), 1);
    }

    #[test]
    fn same_text_for_different_executables() {
        let mask = PromiseMask::granting(&[Promise::Stdio, Promise::Rpath]);
        let a = compile(mask, Path::new("/bin/a")).unwrap();
        let b = compile(mask, Path::new("/opt/tools/b")).unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_ne!(a.params(), b.params());
    }

    #[test]
    fn untranslated_promise_fails_closed() {
        let mask = PromiseMask::granting(&[Promise::Stdio, Promise::Settime]);
        let err = compile(mask, Path::new(EXE)).unwrap_err();
        assert_eq!(err, PledgeError::UnsupportedPromise("settime".into()));
    }

    #[test]
    fn every_untranslated_promise_is_rejected() {
        for promise in Promise::ALL.iter().copied().filter(|p| !is_supported(*p)) {
            let mask = PromiseMask::granting(&[Promise::Stdio, promise]);
            assert_eq!(
                compile(mask, Path::new(EXE)).unwrap_err(),
                PledgeError::UnsupportedPromise(promise.name().to_string()),
            );
        }
    }

    #[test]
    fn unregistered_bit_fails_closed() {
        let stdio = PromiseMask::granting(&[Promise::Stdio]);
        let mask = PromiseMask::from_raw(stdio.bits() & !(1u64 << 33));
        let err = compile(mask, Path::new(EXE)).unwrap_err();
        assert_eq!(err, PledgeError::UnsupportedPromise("bit33".into()));
    }

    #[test]
    fn unveil_is_not_translated() {
        assert!(!is_supported(Promise::Unveil));
    }

    #[test]
    fn oversize_profile_is_rejected() {
        let compiler = ProfileCompiler::with_limit(64);
        let err = compiler
            .compile(PromiseMask::granting(&[Promise::Stdio]), Path::new(EXE))
            .unwrap_err();
        assert_eq!(err, PledgeError::PolicyTooLarge { limit: 64 });
    }

    #[test]
    fn bound_reserves_the_terminator() {
        let mask = supported_mask();
        let full = compile(mask, Path::new(EXE)).unwrap();

        let exact = ProfileCompiler::with_limit(full.len() + 1)
            .compile(mask, Path::new(EXE))
            .unwrap();
        assert_eq!(exact, full);

        let short = ProfileCompiler::with_limit(full.len()).compile(mask, Path::new(EXE));
        assert_eq!(
            short.unwrap_err(),
            PledgeError::PolicyTooLarge { limit: full.len() }
        );
    }

    #[test]
    fn every_limit_either_fits_or_fails_cleanly() {
        let mask = supported_mask();
        let full_len = compile(mask, Path::new(EXE)).unwrap().len();
        for limit in (0..=full_len + 8).step_by(37) {
            match ProfileCompiler::with_limit(limit).compile(mask, Path::new(EXE)) {
                Ok(policy) => assert!(policy.len() < limit),
                Err(err) => assert_eq!(err, PledgeError::PolicyTooLarge { limit }),
            }
        }
    }

    #[test]
    fn full_coverage_fits_default_bound() {
        let policy = compile(supported_mask(), Path::new(EXE)).unwrap();
        assert!(policy.len() < SBPL_MAX_SIZE);
    }

    #[test]
    fn fragments_follow_bit_order() {
        let mask = PromiseMask::granting(&[Promise::Tmppath, Promise::Stdio, Promise::Inet]);
        let policy = compile(mask, Path::new(EXE)).unwrap();
        let text = policy.as_str();
        let stdio = text.find(";; stdio").unwrap();
        let inet = text.find(";; inet").unwrap();
        let tmppath = text.find(";; tmppath").unwrap();
        assert!(stdio < inet && inet < tmppath);
    }

    #[test]
    fn vminfo_reads_vm_and_proc_sysctls() {
        let rules = translation(Promise::Vminfo).unwrap();
        assert!(rules.contains("(allow sysctl-read"));
        assert!(rules.contains("(sysctl-name-prefix \"vm.\")"));
        assert!(rules.contains("(sysctl-name-prefix \"kern.proc.\")"));
        assert!(rules.contains("process-info-pidinfo"));
    }

    #[test]
    fn empty_grant_compiles_to_header_only() {
        let policy = compile(PromiseMask::DENY_ALL, Path::new(EXE)).unwrap();
        assert_eq!(policy.as_str(), PROFILE_HEADER);
    }
}
