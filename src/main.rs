use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use visionpilot_lib::agent_engine::action::ActionProtocol;
use visionpilot_lib::agent_engine::event_bus::{EventBus, RunEvent};
use visionpilot_lib::agent_engine::state::AgentState;
use visionpilot_lib::commands::AgentHandle;
use visionpilot_lib::config::{load_config, load_config_from};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Coordinate,
    Accessibility,
}

impl From<ProtocolArg> for ActionProtocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Coordinate => ActionProtocol::Coordinate,
            ProtocolArg::Accessibility => ActionProtocol::Accessibility,
        }
    }
}

/// Drive the desktop with a vision model until it reports DONE.
#[derive(Debug, Parser)]
#[command(name = "visionpilot", version, about)]
struct Cli {
    /// What the model should accomplish, e.g. "open notepad and type hello".
    instruction: String,

    /// Action vocabulary offered to the model (overrides config.toml).
    #[arg(long, value_enum)]
    protocol: Option<ProtocolArg>,

    /// Step limit for the run (overrides config.toml).
    #[arg(long)]
    max_steps: Option<u32>,

    /// Explicit config file instead of the default search path.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    visionpilot_lib::init_tracing();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let mut config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::from(2);
        }
    };
    if let Some(protocol) = cli.protocol {
        config.agent.protocol = protocol.into();
    }
    if let Some(max_steps) = cli.max_steps {
        config.agent.max_steps = max_steps;
    }

    let events = EventBus::new();
    let engine = match visionpilot_lib::build_engine(&config) {
        Ok(engine) => engine.with_events(events.clone()),
        Err(e) => {
            tracing::error!(error = %e, "failed to build agent engine");
            return ExitCode::from(2);
        }
    };

    let printer = tokio::spawn(print_progress(events.subscribe()));

    let handle = Arc::new(AgentHandle::new(Arc::new(engine)));
    if let Err(e) = handle.start_task(cli.instruction.clone()) {
        tracing::error!(error = %e, "could not start run");
        return ExitCode::from(2);
    }

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, stopping run");
            stopper.stop_task();
        }
    });

    let report = match handle.wait().await {
        Ok(Some(report)) => report,
        Ok(None) => return ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "run did not finish cleanly");
            return ExitCode::FAILURE;
        }
    };

    // The run has returned, so RunFinished is already on the bus.
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    println!("run {} finished: {:?} after {} action(s)", report.run_id, report.state, report.history.len());
    match report.state {
        AgentState::Completed => ExitCode::SUCCESS,
        AgentState::Cancelled => ExitCode::from(130),
        AgentState::Capped { .. } => ExitCode::from(3),
        _ => {
            if let Some(e) = &report.error {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Prints actions and outcomes until the run reaches a terminal state.
async fn print_progress(mut events: Receiver<RunEvent>) {
    loop {
        match events.recv().await {
            Ok(RunEvent::ActionParsed { step, action, .. }) => println!("[{step}] {action}"),
            Ok(RunEvent::ActionDispatched { step, outcome, .. }) => println!("[{step}]   -> {outcome}"),
            Ok(RunEvent::RunFinished { state, .. }) if state.is_terminal() => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "progress output fell behind; some events were dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
