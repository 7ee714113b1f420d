//! Satellite QKD Simulator CLI
//!
//! Run a BB84 key exchange, print the results and play the protocol back.

use clap::Parser;
use qkd_core::sequence::DEFAULT_SEQUENCE_LENGTH;
use qkd_core::{SimulationConfig, SimulationRequest};
use qkd_env::{QkdContext, TokioContext};
use qkd_sim::report::{event_line, outcome_line, progress_line, render_report};
use qkd_sim::scenarios::ScenarioId;
use qkd_sim::{
    PacingConfig, PlaybackConfig, ScenarioResult, ScenarioRunner, SessionError, SessionExport,
    SessionRunner, SimContext,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Satellite QKD (BB84) simulator
#[derive(Parser, Debug)]
#[command(name = "qkd-sim")]
#[command(about = "Simulate satellite-mediated BB84 key distribution", long_about = None)]
struct Args {
    /// Message to encrypt with the distributed key
    #[arg(short, long, default_value = "Hello Quantum World!")]
    message: String,

    /// Put an eavesdropper on the quantum channel
    #[arg(short, long)]
    intercept: bool,

    /// Master seed for determinism (0 = random from OS entropy)
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Photons per run
    #[arg(short, long, default_value_t = DEFAULT_SEQUENCE_LENGTH)]
    length: usize,

    /// Skip all pacing delays (virtual clock)
    #[arg(long)]
    instant: bool,

    /// Print results without playing the protocol back
    #[arg(long)]
    no_playback: bool,

    /// Stop the playback after this many photons
    #[arg(long)]
    stop_after: Option<usize>,

    /// Run a canned scenario instead (secure_channel, interception, stopped_playback, empty_message, all)
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export the session to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn simulation_config(&self) -> SimulationConfig {
        let config = SimulationConfig::default().with_sequence_length(self.length);
        if self.seed == 0 {
            config
        } else {
            config.with_seed(self.seed)
        }
    }

    fn playback_config(&self) -> PlaybackConfig {
        let pacing = if self.instant {
            PacingConfig::instant()
        } else {
            PacingConfig::default()
        };
        PlaybackConfig::default().with_pacing(pacing)
    }
}

/// Runs one session. Returns `Ok(())` for both completed and stopped playbacks.
async fn run_session<Ctx: QkdContext>(context: Arc<Ctx>, args: &Args) -> Result<(), SessionError> {
    let mut runner = SessionRunner::new(context, args.simulation_config(), args.playback_config());
    let request = SimulationRequest::new(args.message.clone(), args.intercept);

    let quiet = args.json;
    let session = runner
        .prepare(request, |step| {
            if !quiet {
                println!("{}", progress_line(step));
            }
        })
        .await?;

    if !args.json {
        println!();
        println!("{}", render_report(&session.result));
    }

    let mut export = SessionExport::new(&session);

    if !args.no_playback {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = runner.play_stopping_after(&session, tx, args.stop_after);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        if !args.json {
                            println!("{}", event_line(&event));
                        }
                        export.add_event(event);
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted");
                    runner.stop();
                }
            }
        }

        let outcome = handle.wait().await?;
        if !args.json {
            println!();
            println!("{}", outcome_line(&outcome));
        }
        export.finalize(Some(outcome));
    }

    if args.json {
        println!("{}", export.to_json()?);
    }

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("[{}] Exported session to {}", session.run_id, path);
    }

    Ok(())
}

/// Runs canned scenarios. Returns the number of failures.
async fn run_scenarios<Ctx: QkdContext>(
    context: Arc<Ctx>,
    scenarios: &[ScenarioId],
    seed: u64,
    args: &Args,
) -> usize {
    let runner = ScenarioRunner::new(context, seed).with_playback(args.playback_config());

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        let result = runner.run(*scenario).await;
        if !args.json {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED: {}",
                    scenario.name(),
                    seed,
                    scenario.description()
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else if failed == 0 {
        info!("✅ All {} scenarios passed!", results.len());
    } else {
        error!("❌ {}/{} scenarios failed!", failed, results.len());
    }
    failed
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Satellite QKD Simulator v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Some(name) = &args.scenario {
        let scenarios: Vec<ScenarioId> = if name == "all" {
            ScenarioId::all()
        } else {
            vec![name.parse().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                eprintln!(
                    "Available scenarios: secure_channel, interception, stopped_playback, empty_message, all"
                );
                std::process::exit(1);
            })]
        };
        // Scenarios always run seeded so failures can be replayed
        let seed = if args.seed == 0 { rand::random() } else { args.seed };

        let failed = if args.instant {
            run_scenarios(SimContext::shared(seed), &scenarios, seed, &args).await
        } else {
            run_scenarios(TokioContext::shared(), &scenarios, seed, &args).await
        };
        if failed > 0 {
            std::process::exit(1);
        }
        return;
    }

    let outcome = if args.instant {
        run_session(SimContext::shared(args.seed), &args).await
    } else {
        run_session(TokioContext::shared(), &args).await
    };

    // Exit with proper code for scripting
    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(if e.is_rejected_request() { 2 } else { 1 });
    }
}
