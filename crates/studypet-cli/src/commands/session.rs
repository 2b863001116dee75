use clap::Subcommand;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use studypet_core::focus::feed::spawn_sample_feed;
use studypet_core::timer::driver::{spawn_ticker, TickerExit};
use studypet_core::storage::LAST_EVENT_KEY;
use studypet_core::{
    Database, EngineError, Event, FocusSample, ProgressionController, SessionReport,
    SharedController,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{load_config, require_pet};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a session in the foreground, printing events as JSON lines
    Run {
        /// Session length in minutes
        minutes: i64,
        /// Allow a length that is not one of the presets
        #[arg(long)]
        custom: bool,
        /// Read focus samples (one JSON object per line) from stdin
        #[arg(long)]
        focus_stdin: bool,
        /// Run the clock this many times faster than real time
        #[arg(long, default_value = "1", hide = true)]
        time_scale: u32,
    },
    /// Print the pet snapshot and the last recorded session event as JSON
    Status,
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;
    let db = Database::open()?;
    let pet = require_pet(&db, &config)?;

    match action {
        SessionAction::Run {
            minutes,
            custom,
            focus_stdin,
            time_scale,
        } => {
            config.session.allow_custom |= custom;
            let mut controller = ProgressionController::from_config(pet, &config)?;
            controller.add_observer(Box::new(db));
            let tick = controller.settings().tick_interval;
            let period = (tick / time_scale.max(1)).max(Duration::from_millis(1));

            for event in controller.start_session(minutes)? {
                print_event(&event);
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let shared = controller.into_shared();
            let outcome = runtime.block_on(drive(Arc::clone(&shared), period, focus_stdin));
            // A pending stdin read must not keep the process alive.
            runtime.shutdown_background();
            outcome?;

            let snapshot = shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .snapshot();
            print_event(&snapshot);
        }
        SessionAction::Status => {
            if let Some(last) = db.kv_get(LAST_EVENT_KEY)? {
                println!("{last}");
            }
            let controller = ProgressionController::from_config(pet, &config)?;
            print_event(&controller.snapshot());
        }
    }
    Ok(())
}

/// Tick the shared controller until the session ends or Ctrl-C cancels it.
async fn drive(
    shared: SharedController,
    period: Duration,
    focus_stdin: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    if focus_stdin {
        let focus = shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .focus();
        let (samples_tx, samples_rx) = mpsc::channel::<FocusSample>(64);
        spawn_sample_feed(focus, samples_rx);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<FocusSample>(&line) {
                    Ok(sample) => {
                        if samples_tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed focus sample"),
                }
            }
        });
    }

    let ticker = spawn_ticker(Arc::clone(&shared), period, events_tx.clone());
    let result = tokio::select! {
        exit = ticker.join() => match exit {
            TickerExit::Completed(report) => {
                report_failures(&report.failures);
                Ok(())
            }
            TickerExit::SessionGone => Ok(()),
            TickerExit::Failed(e) => Err(e.into()),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, cancelling session");
            match cancel_on_interrupt(&shared) {
                Ok(Some(report)) => {
                    report_failures(&report.failures);
                    for event in report.events {
                        let _ = events_tx.send(event);
                    }
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    };

    drop(events_tx);
    let _ = printer.await;
    result
}

/// Cancel the active session, if any. `None` when the session already
/// finished on the tick that raced the signal.
fn cancel_on_interrupt(shared: &SharedController) -> Result<Option<SessionReport>, EngineError> {
    let cancelled = shared
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cancel_session();
    match cancelled {
        Ok(report) => Ok(Some(report)),
        Err(EngineError::NoActiveSession) => Ok(None),
        Err(e) => Err(e),
    }
}

fn report_failures(failures: &[studypet_core::progression::ObserverFailure]) {
    for failure in failures {
        eprintln!(
            "warning: {} could not record the session: {}",
            failure.observer, failure.message
        );
    }
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to serialize event"),
    }
}
