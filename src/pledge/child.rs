use super::promises::PromiseMask;
use super::report::{EnterOutcome, OpenAttempt, ProbeReport, ProbeRequest};
use super::{PledgeError, enter, enter_strict, probe, state};

/// Entry point for the probe child process.
///
/// Called when the binary detects argv[0] ends with "sbpledge-probe". The
/// child pledges itself, so it exits instead of returning to the CLI.
///
/// argv layout:
///   argv[0] = "sbpledge-probe" (already consumed by dispatch)
///   argv[1] = ProbeRequest JSON
pub fn probe_child_main() -> ! {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("sbpledge-probe: expected a probe request argument");
        std::process::exit(1);
    }

    let request: ProbeRequest = match serde_json::from_str(&args[1]) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sbpledge-probe: failed to parse request: {}", e);
            std::process::exit(1);
        }
    };

    // warnings from the engine go to stderr, which the parent collects
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let report = run_probe(request);

    match serde_json::to_string(&report) {
        Ok(json) => {
            println!("{}", json);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("sbpledge-probe: failed to encode report: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_probe(request: ProbeRequest) -> ProbeReport {
    let opens_before = open_all(&request);

    let mask = match request.raw_mask {
        Some(raw) => Ok(PromiseMask::from_raw(raw)),
        None => request.promises.parse::<PromiseMask>(),
    };
    let pledge = |mask: Result<PromiseMask, PledgeError>| {
        let mask = mask?;
        if request.strict {
            enter_strict(mask, 0)
        } else {
            enter(mask, 0)
        }
    };

    let first = pledge(mask.clone());
    let state = state::state();
    let enforced = state::is_enforced();
    let opens_after = open_all(&request);

    let (second_enter, state_after_second) = if request.repeat {
        let second = pledge(mask);
        (Some(EnterOutcome::from(&second)), Some(state::state()))
    } else {
        (None, None)
    };

    ProbeReport {
        available: probe::is_available(),
        opens_before,
        enter: EnterOutcome::from(&first),
        state,
        enforced,
        opens_after,
        second_enter,
        state_after_second,
        request,
    }
}

fn open_all(request: &ProbeRequest) -> Vec<OpenAttempt> {
    request
        .open_paths
        .iter()
        .cloned()
        .map(OpenAttempt::try_open)
        .collect()
}
