//! End-to-end checks against the built binary. Each case pledges a fresh
//! child, never the test harness.

use std::path::Path;

use sbpledge::pledge::{ProbeReport, ProbeRequest, Promise, PromiseMask, SandboxState, run_probe_with};

const TIMEOUT_MS: u64 = 10_000;

async fn run_child(request: &ProbeRequest) -> ProbeReport {
    let exe = Path::new(env!("CARGO_BIN_EXE_sbpledge"));
    run_probe_with(exe, request, TIMEOUT_MS)
        .await
        .expect("child should report")
}

#[tokio::test]
async fn stdio_pledge_denies_reads_and_refuses_a_second_pledge() {
    let request = ProbeRequest {
        open_paths: vec!["/etc/passwd".into()],
        repeat: true,
        ..ProbeRequest::new("stdio")
    };
    let report = run_child(&request).await;

    assert!(report.opens_before.iter().all(|open| open.ok));
    assert!(report.enter.ok, "first pledge failed: {:?}", report.enter);

    if cfg!(target_os = "macos") && report.available {
        assert_eq!(report.state, SandboxState::Active);
        assert!(report.enforced);
        assert!(report.opens_after.iter().all(|open| !open.ok));

        let second = report.second_enter.expect("second pledge outcome");
        assert!(second.is_error("already_active"), "{second:?}");
        assert_eq!(report.state_after_second, Some(SandboxState::Active));
    } else {
        assert!(!report.available);
        assert_eq!(report.state, SandboxState::Pledged);
        assert!(!report.enforced);
        assert!(report.opens_after.iter().all(|open| open.ok));

        let second = report.second_enter.expect("second pledge outcome");
        assert!(second.ok, "{second:?}");
        assert_eq!(report.state_after_second, Some(SandboxState::Pledged));
    }
}

#[cfg(not(target_os = "macos"))]
#[tokio::test]
async fn strict_pledge_without_seatbelt_is_refused_but_recorded() {
    let request = ProbeRequest {
        strict: true,
        ..ProbeRequest::new("stdio")
    };
    let report = run_child(&request).await;

    assert!(report.enter.is_error("primitive_unavailable"), "{:?}", report.enter);
    assert_eq!(report.state, SandboxState::Pledged);
    assert!(!report.enforced);
}

#[tokio::test]
async fn untranslated_raw_bit_leaves_the_child_unpledged() {
    let request = ProbeRequest {
        raw_mask: Some(PromiseMask::granting(&[Promise::Stdio]).bits() & !(1u64 << 40)),
        ..ProbeRequest::new("")
    };
    let report = run_child(&request).await;

    assert!(report.enter.is_error("unsupported_promise"), "{:?}", report.enter);
    assert_eq!(report.state, SandboxState::Unpledged);
    assert!(!report.enforced);
}

#[tokio::test]
async fn unknown_promise_word_never_reaches_the_engine() {
    let report = run_child(&ProbeRequest::new("stdio unknown_promise_x")).await;

    assert!(report.enter.is_error("unknown_promise"), "{:?}", report.enter);
    assert_eq!(report.state, SandboxState::Unpledged);
}
