use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::oneshot;
use vocal_range_trainer::analysis;
use vocal_range_trainer::config::AppConfig;
use vocal_range_trainer::engine::{Clock, Collaborators, EngineHandle, SystemClock};
use vocal_range_trainer::notes;
use vocal_range_trainer::session::{RunOutcome, SessionEvent, SessionReport};
use vocal_range_trainer::testing::{virtual_singer, ManualClock, Response};

#[derive(Parser, Debug)]
#[command(
    name = "vocal_range_cli",
    about = "Vocal range assessment: live sessions, simulation and pitch tooling"
)]
struct Cli {
    /// Log debug output
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the reference note table
    Notes {
        #[arg(long, default_value_t = 48)]
        low: i32,
        #[arg(long, default_value_t = 72)]
        high: i32,
    },
    /// Estimate pitch block by block over a WAV file
    Estimate {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long, default_value_t = 2048)]
        block: usize,
    },
    /// Run a full session against a scripted virtual singer
    Simulate {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use the sine-tone preset instead of the piano preset
        #[arg(long)]
        sine: bool,
        /// Lowest MIDI note sung in tune (defaults to the range start)
        #[arg(long)]
        strong_low: Option<i32>,
        /// Highest MIDI note sung in tune (defaults to the range end)
        #[arg(long)]
        strong_high: Option<i32>,
        /// Detune applied to notes outside the in-tune span
        #[arg(long, default_value_t = 150.0)]
        detune_cents: f32,
        /// MIDI notes the singer stays silent on
        #[arg(long = "silent")]
        silent: Vec<i32>,
        /// Retry every eligible note after the sequence
        #[arg(long)]
        retry: bool,
        /// Pace the session with the wall clock; Ctrl-C aborts it
        #[arg(long)]
        realtime: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a live session on the default audio devices
    Assess {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        sine: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    vocal_range_trainer::init_logging(level);

    match cli.command {
        Commands::Notes { low, high } => run_notes(low, high),
        Commands::Estimate { wav, block } => run_estimate(&wav, block),
        Commands::Simulate {
            config,
            sine,
            strong_low,
            strong_high,
            detune_cents,
            silent,
            retry,
            realtime,
            output,
        } => {
            let config = load_config(config.as_deref(), sine);
            let low = strong_low.unwrap_or(config.assessment.midi_range_low);
            let high = strong_high.unwrap_or(config.assessment.midi_range_high);
            let range = (
                config.assessment.midi_range_low,
                config.assessment.midi_range_high,
            );
            let script = notes::generate(range.0, range.1)
                .into_iter()
                .map(|note| {
                    let response = if silent.contains(&note.midi) {
                        Response::Silent
                    } else if (low..=high).contains(&note.midi) {
                        Response::Exact
                    } else {
                        Response::Detuned(detune_cents)
                    };
                    (note.midi, response)
                })
                .collect();
            run_simulate(config, script, retry, realtime, output)
        }
        Commands::Assess {
            config,
            sine,
            output,
        } => run_assess(load_config(config.as_deref(), sine), output),
    }
}

fn load_config(path: Option<&Path>, sine: bool) -> AppConfig {
    match (path, sine) {
        (Some(path), _) => AppConfig::load_from_file(path),
        (None, true) => AppConfig::sine(),
        (None, false) => AppConfig::default(),
    }
}

fn run_notes(low: i32, high: i32) -> Result<ExitCode> {
    if low > high {
        bail!("empty range {}..={}", low, high);
    }
    for note in notes::generate(low, high) {
        println!("{:>4}  {:<4} {:>8.2} Hz", note.midi, note.name, note.frequency_hz);
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct BlockEstimate {
    block: usize,
    frequency_hz: f32,
    rms: f32,
    note: Option<String>,
}

fn run_estimate(path: &Path, block_size: usize) -> Result<ExitCode> {
    if block_size < 2 {
        bail!("block size must be at least 2");
    }
    let (samples, sample_rate) = read_wav_mono(path)?;

    for (block, chunk) in samples.chunks_exact(block_size).enumerate() {
        let estimate = analysis::estimate(chunk, sample_rate as f32);
        let line = BlockEstimate {
            block,
            frequency_hz: estimate.frequency_hz,
            rms: estimate.rms,
            note: estimate.frequency().and_then(notes::nearest_note_name),
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(ExitCode::from(0))
}

fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

fn run_simulate(
    config: AppConfig,
    script: Vec<(i32, Response)>,
    retry: bool,
    realtime: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let sample_rate = config.audio.sample_rate as f32;
    let (capture, player) = virtual_singer(script, sample_rate);
    let clock: Arc<dyn Clock> = if realtime {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(ManualClock::new())
    };
    let collaborators = Collaborators::new(Box::new(capture), Box::new(player), clock);
    let engine = Arc::new(
        EngineHandle::with_collaborators(config, collaborators)
            .context("building simulated engine")?,
    );

    let report = match run_interruptible(&engine)? {
        RunOutcome::Finished(report) => report,
        RunOutcome::Aborted => return Ok(ExitCode::from(2)),
    };

    let report = if retry {
        for midi in engine.eligible_retries() {
            engine
                .retry_note(midi)
                .with_context(|| format!("retrying MIDI {}", midi))?;
        }
        engine.report()?
    } else {
        report
    };

    emit_report(&report, output)?;
    Ok(ExitCode::from(0))
}

fn run_assess(config: AppConfig, output: Option<PathBuf>) -> Result<ExitCode> {
    let engine = Arc::new(EngineHandle::new(config).context("building engine")?);
    let events = engine.subscribe_events();

    let printer = thread::spawn(move || {
        let mut events = events;
        while let Some(event) = events.blocking_recv() {
            match event {
                SessionEvent::NoteStarted { note, .. } => {
                    eprintln!("-> {} ({:.2} Hz)", note.name, note.frequency_hz)
                }
                SessionEvent::OnsetTimeout { .. } => eprintln!("   no voice detected"),
                SessionEvent::NoteGraded { result, .. } => eprintln!(
                    "   {} (strong {:.0}%, weak {:.0}%)",
                    result.grade.display_name(),
                    result.strong_ratio * 100.0,
                    result.weak_ratio * 100.0
                ),
                SessionEvent::Completed { .. } => break,
                SessionEvent::Aborted => {
                    eprintln!("   aborted");
                    break;
                }
                SessionEvent::Failed { message, .. } => {
                    eprintln!("   {}", message);
                    break;
                }
                _ => {}
            }
        }
    });

    let outcome = run_interruptible(&engine);

    // Drop every engine handle so the event channel closes and the printer
    // exits
    drop(engine);
    if printer.join().is_err() {
        log::warn!("[vocal_range_cli] Event printer panicked");
    }

    match outcome? {
        RunOutcome::Finished(report) => {
            emit_report(&report, output)?;
            Ok(ExitCode::from(0))
        }
        RunOutcome::Aborted => Ok(ExitCode::from(2)),
    }
}

/// Run the sequence on a worker thread while Ctrl-C aborts it.
fn run_interruptible(engine: &Arc<EngineHandle>) -> Result<RunOutcome<SessionReport>> {
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let interrupt = spawn_interrupt_watcher(Arc::clone(engine), done_rx)?;

    let worker = {
        let engine = Arc::clone(engine);
        thread::spawn(move || engine.start_session())
    };
    let outcome = worker.join();

    let _ = done_tx.send(());
    if interrupt.join().is_err() {
        log::warn!("[vocal_range_cli] Interrupt watcher panicked");
    }

    let outcome = outcome.map_err(|_| anyhow!("session thread panicked"))??;
    Ok(outcome)
}

/// Abort the session on Ctrl-C until `done` fires
fn spawn_interrupt_watcher(
    engine: Arc<EngineHandle>,
    done: oneshot::Receiver<()>,
) -> Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;

    let handle = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => match signal {
                        Ok(()) => {
                            log::info!("[vocal_range_cli] Ctrl-C received, aborting session");
                            engine.abort();
                        }
                        Err(err) => log::warn!("[vocal_range_cli] Ctrl-C hook unavailable: {}", err),
                    },
                    _ = done => {}
                }
            });
        })
        .context("spawning interrupt watcher")?;
    Ok(handle)
}

fn emit_report(report: &SessionReport, output_path: Option<PathBuf>) -> Result<()> {
    let json = report.to_json()?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}
