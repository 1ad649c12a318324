//! sbpledge - OpenBSD-style pledge() for macOS
//!
//! This crate provides:
//! - Promise vocabulary and the inverted promise mask
//! - SBPL profile compilation with a fixed size bound
//! - Runtime activation through `sandbox_init_with_parameters`
//! - The `sbpledge` CLI for inspecting profiles and smoke-testing enforcement

pub mod cli;
pub mod config;
pub mod paths;
pub mod pledge;

pub use config::Config;
pub use pledge::{PledgeError, Promise, PromiseMask, enter, enter_strict, is_enforced, pledge};
