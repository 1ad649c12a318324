//! Promise vocabulary and the inverted promise mask.
//!
//! Bit positions follow the OpenBSD promise order used by the cosmopolitan
//! pledge family and are part of the persisted format: a mask may be handed
//! across `exec`, so a promise keeps its bit forever. New promises take the
//! next free bit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::PledgeError;

/// A named category of operations a process may keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Promise {
    Stdio = 0,
    Rpath = 1,
    Wpath = 2,
    Cpath = 3,
    Dpath = 4,
    Flock = 5,
    Fattr = 6,
    Inet = 7,
    Unix = 8,
    Dns = 9,
    Tty = 10,
    Recvfd = 11,
    Proc = 12,
    Exec = 13,
    Id = 14,
    Unveil = 15,
    Sendfd = 16,
    Settime = 17,
    ProtExec = 18,
    Vminfo = 19,
    Tmppath = 20,
    Chown = 21,
}

impl Promise {
    /// Every registered promise, in bit order.
    pub const ALL: [Promise; 22] = [
        Promise::Stdio,
        Promise::Rpath,
        Promise::Wpath,
        Promise::Cpath,
        Promise::Dpath,
        Promise::Flock,
        Promise::Fattr,
        Promise::Inet,
        Promise::Unix,
        Promise::Dns,
        Promise::Tty,
        Promise::Recvfd,
        Promise::Proc,
        Promise::Exec,
        Promise::Id,
        Promise::Unveil,
        Promise::Sendfd,
        Promise::Settime,
        Promise::ProtExec,
        Promise::Vminfo,
        Promise::Tmppath,
        Promise::Chown,
    ];

    /// Bit position of this promise in a [`PromiseMask`].
    pub fn bit(self) -> u32 {
        self as u32
    }

    /// The promise word as written in a promise string.
    pub fn name(self) -> &'static str {
        match self {
            Promise::Stdio => "stdio",
            Promise::Rpath => "rpath",
            Promise::Wpath => "wpath",
            Promise::Cpath => "cpath",
            Promise::Dpath => "dpath",
            Promise::Flock => "flock",
            Promise::Fattr => "fattr",
            Promise::Inet => "inet",
            Promise::Unix => "unix",
            Promise::Dns => "dns",
            Promise::Tty => "tty",
            Promise::Recvfd => "recvfd",
            Promise::Proc => "proc",
            Promise::Exec => "exec",
            Promise::Id => "id",
            Promise::Unveil => "unveil",
            Promise::Sendfd => "sendfd",
            Promise::Settime => "settime",
            Promise::ProtExec => "prot_exec",
            Promise::Vminfo => "vminfo",
            Promise::Tmppath => "tmppath",
            Promise::Chown => "chown",
        }
    }

    /// Look up a promise by name.
    pub fn from_name(name: &str) -> Result<Self, PledgeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == name)
            .ok_or_else(|| PledgeError::UnknownPromise(name.to_string()))
    }

    /// Look up a promise by bit position.
    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.get(bit as usize).copied()
    }
}

impl fmt::Display for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Human-readable name for a mask bit, registered or not.
pub fn bit_name(bit: u32) -> String {
    match Promise::from_bit(bit) {
        Some(promise) => promise.name().to_string(),
        None => format!("bit{bit}"),
    }
}

/// Inverted promise bitmask: a set bit means the promise is denied.
///
/// The default value denies everything, so an uninitialised mask can never
/// read as permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromiseMask(u64);

impl PromiseMask {
    /// No promise granted.
    pub const DENY_ALL: PromiseMask = PromiseMask(u64::MAX);

    /// Wrap a raw inverted mask as passed across the C-style contract.
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw inverted bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Build a mask granting exactly `promises`.
    pub fn granting(promises: &[Promise]) -> Self {
        promises
            .iter()
            .fold(Self::DENY_ALL, |mask, promise| mask.grant(*promise))
    }

    /// Return a copy with `promise` granted.
    #[must_use]
    pub fn grant(self, promise: Promise) -> Self {
        Self(self.0 & !(1u64 << promise.bit()))
    }

    pub fn is_granted(self, promise: Promise) -> bool {
        self.is_bit_granted(promise.bit())
    }

    pub fn is_bit_granted(self, bit: u32) -> bool {
        bit < u64::BITS && self.0 & (1u64 << bit) == 0
    }

    /// Granted bit positions in ascending order, including unregistered bits.
    pub fn granted_bits(self) -> impl Iterator<Item = u32> {
        (0..u64::BITS).filter(move |bit| self.is_bit_granted(*bit))
    }

    /// Registered promises granted by this mask.
    pub fn granted(self) -> Vec<Promise> {
        self.granted_bits().filter_map(Promise::from_bit).collect()
    }

    /// First bit this mask grants that `recorded` has already denied.
    pub fn first_escalation_over(self, recorded: PromiseMask) -> Option<u32> {
        let regained = !self.0 & recorded.0;
        (regained != 0).then(|| regained.trailing_zeros())
    }
}

impl Default for PromiseMask {
    fn default() -> Self {
        Self::DENY_ALL
    }
}

impl FromStr for PromiseMask {
    type Err = PledgeError;

    /// Parse a whitespace-separated promise string such as `"stdio rpath"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .try_fold(Self::DENY_ALL, |mask, word| {
                Ok(mask.grant(Promise::from_name(word)?))
            })
    }
}

impl fmt::Display for PromiseMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.granted_bits().map(bit_name).collect();
        f.write_str(&names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mask_denies_everything() {
        let mask = PromiseMask::default();
        assert_eq!(mask.bits(), u64::MAX);
        assert_eq!(mask.granted_bits().count(), 0);
        for promise in Promise::ALL {
            assert!(!mask.is_granted(promise));
        }
    }

    #[test]
    fn bit_positions_are_stable() {
        assert_eq!(Promise::Stdio.bit(), 0);
        assert_eq!(Promise::Rpath.bit(), 1);
        assert_eq!(Promise::Inet.bit(), 7);
        assert_eq!(Promise::Exec.bit(), 13);
        assert_eq!(Promise::Unveil.bit(), 15);
        assert_eq!(Promise::Tmppath.bit(), 20);
        assert_eq!(Promise::Chown.bit(), 21);
        for (index, promise) in Promise::ALL.iter().enumerate() {
            assert_eq!(promise.bit() as usize, index);
        }
    }

    #[test]
    fn parse_promise_string() {
        let mask: PromiseMask = "stdio  rpath\tinet".parse().unwrap();
        assert!(mask.is_granted(Promise::Stdio));
        assert!(mask.is_granted(Promise::Rpath));
        assert!(mask.is_granted(Promise::Inet));
        assert!(!mask.is_granted(Promise::Wpath));
        assert_eq!(mask.bits(), !0b1000_0011u64);
        assert_eq!(mask.to_string(), "stdio rpath inet");
    }

    #[test]
    fn empty_string_grants_nothing() {
        let mask: PromiseMask = "".parse().unwrap();
        assert_eq!(mask, PromiseMask::DENY_ALL);
    }

    #[test]
    fn unknown_word_is_rejected() {
        let err = "stdio unknown_promise_x".parse::<PromiseMask>().unwrap_err();
        assert_eq!(err, PledgeError::UnknownPromise("unknown_promise_x".into()));
    }

    #[test]
    fn names_round_trip_through_registry() {
        for promise in Promise::ALL {
            assert_eq!(Promise::from_name(promise.name()).unwrap(), promise);
        }
        assert_eq!(Promise::from_name("prot_exec").unwrap(), Promise::ProtExec);
    }

    #[test]
    fn unregistered_bits_are_named_by_position() {
        let mask = PromiseMask::from_raw(!(1u64 << 40));
        assert!(mask.is_bit_granted(40));
        assert!(mask.granted().is_empty());
        assert_eq!(mask.to_string(), "bit40");
    }

    #[test]
    fn escalation_detects_regained_promises() {
        let recorded = PromiseMask::granting(&[Promise::Stdio, Promise::Rpath]);
        let narrower = PromiseMask::granting(&[Promise::Stdio]);
        let wider = PromiseMask::granting(&[Promise::Stdio, Promise::Inet]);

        assert_eq!(narrower.first_escalation_over(recorded), None);
        assert_eq!(recorded.first_escalation_over(recorded), None);
        assert_eq!(
            wider.first_escalation_over(recorded),
            Some(Promise::Inet.bit())
        );
    }
}
