//! Template replay engine.
//!
//! [`DataGenerator::generate`] produces one or more output files by replaying a
//! template file from the top until a stop condition triggers. Every replayed
//! line is tagged with a [`marker`](crate::marker()) and a timestamp, either by
//! replacing the first occurrence of the configured token or by prepending the
//! value and a space.
//!
//! ## Stop conditions
//!
//! - Per file: the event budget, the size budget and the runtime budget. Each
//!   is ignored when set to zero.
//! - Per call: the number of files and the runtime budget.
//!
//! The size check happens before a line is written: a line that would bring
//! the file to or past the budget is dropped and closes the file. Written
//! lines always advance the event sequence by one, across files.
//!
//! ## Timestamps
//!
//! With a data rate configured, lines carry the wall-clock time at which they
//! were produced. Unthrottled generation uses a [`SyntheticClock`] instead.

mod clock;
mod rotation;
#[cfg(test)]
mod tests;
mod throttle;

pub use clock::*;
pub use rotation::output_path_for;
pub use throttle::*;

use crate::{Error, IoContext, Result, marker::marker};
use chrono::{DateTime, Utc};
use core::time::Duration;
use rotation::Retention;
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

/// Generation parameters in machine units.
///
/// See [`DatagenParams`](crate::DatagenParams) for the workload file form.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Template file replayed cyclically.
    pub input_path: PathBuf,
    /// Base output path, see [`output_path_for`].
    pub output_path: PathBuf,
    /// Size budget per file. 0 for unbounded.
    pub max_file_bytes: u64,
    /// Event budget per file. 0 for unbounded.
    pub max_events: u64,
    /// Files to produce. 0 keeps producing files until the runtime is
    /// exhausted.
    pub num_files: u32,
    /// Data rate limit. 0 for unlimited.
    pub max_bytes_per_hour: u64,
    /// Runtime budget for the whole call. Zero for unbounded.
    pub max_runtime: Duration,
    /// Truncate existing output files instead of appending to them.
    pub overwrite: bool,
    pub timestamp_token: Option<String>,
    /// strftime-style format of the substituted timestamps.
    pub timestamp_format: String,
    pub field_token: Option<String>,
    /// Most recent files kept on disk. 0 keeps everything.
    pub files_to_keep: usize,
    /// Event number of the first generated line.
    pub start_event: u64,
    /// Minimum wall time between two progress reports.
    pub progress_interval: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("sample.log"),
            output_path: PathBuf::from("datagen.log"),
            max_file_bytes: 0,
            max_events: 0,
            num_files: 1,
            max_bytes_per_hour: 0,
            max_runtime: Duration::ZERO,
            overwrite: true,
            timestamp_token: Some("@TIME@".to_string()),
            timestamp_format: "%b %d %Y %H:%M:%S %Z".to_string(),
            field_token: Some("@FIELD@".to_string()),
            files_to_keep: 1,
            start_event: 1,
            progress_interval: Duration::from_secs(60),
        }
    }
}

/// Progress of the file currently being written.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub file: PathBuf,
    /// Percentage of the size budget, when one is configured.
    pub by_size: Option<f64>,
    /// Percentage of the event budget, when one is configured.
    pub by_events: Option<f64>,
}

/// Outcome of one [`DataGenerator::generate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Final event number reached, `start_event - 1` when nothing was
    /// written.
    pub last_event: u64,
    /// First unused event number; pass it as the next call's `start_event` to
    /// continue the sequence.
    pub next_event: u64,
    /// Lines written across all files.
    pub events: u64,
    /// Bytes written across all files.
    pub bytes: u64,
    /// Output files still on disk, oldest first.
    pub files: Vec<PathBuf>,
}

type ProgressSink = Box<dyn FnMut(&Progress) + Send>;

/// Replays a template into rate-, size- and event-bounded output files.
pub struct DataGenerator {
    config: GeneratorConfig,
    progress: Option<ProgressSink>,
}

impl DataGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Installs a callback invoked at most once per progress interval.
    #[must_use]
    pub fn with_progress(mut self, sink: impl FnMut(&Progress) + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Runs the generation to completion.
    ///
    /// # Errors
    ///
    /// Fails when the template cannot be read or is empty, when an output
    /// file cannot be created, written or rotated away, or when the
    /// timestamp format is invalid.
    pub fn generate(&mut self) -> Result<Generation> {
        crate::check_timestamp_format(&self.config.timestamp_format)?;

        let started = Instant::now();
        let mut retention = Retention::new(self.config.files_to_keep);
        let mut state = GenerationState {
            started,
            next_event: self.config.start_event,
            events: 0,
            bytes: 0,
            last_report: started,
        };

        let mut index = 0;
        loop {
            if self.config.num_files != 0 && index >= self.config.num_files {
                break;
            }
            if runtime_exhausted(&self.config, started) {
                break;
            }
            retention.make_room()?;
            index += 1;

            let path = output_path_for(&self.config.output_path, index, self.config.num_files);
            prepare_output(&path, self.config.overwrite)?;
            retention.push(path.clone());
            self.fill(&path, &mut state)?;
        }

        let last_event = state.next_event.saturating_sub(1);
        tracing::info!(
            "Generated {} events ({} bytes) in {} file(s), last event {}",
            state.events,
            state.bytes,
            index,
            last_event
        );

        Ok(Generation {
            last_event,
            next_event: state.next_event,
            events: state.events,
            bytes: state.bytes,
            files: retention.into_files(),
        })
    }

    /// Replays the template into `path` until a file-level stop condition.
    fn fill(&mut self, path: &Path, state: &mut GenerationState) -> Result<()> {
        let Self { config, progress } = self;
        let config = &*config;
        let output = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_path(path)?;
        let mut out = BufWriter::new(output);

        let mut file = FileState::default();
        let mut clock = SyntheticClock::starting_today();
        let mut throttle = Throttle::per_hour(config.max_bytes_per_hour);
        let mut raw = Vec::new();

        'replay: while !file_done(config, state.started, &file) {
            let template = File::open(&config.input_path).with_path(&config.input_path)?;
            let mut reader = BufReader::new(template);
            let mut replayed = false;

            loop {
                raw.clear();
                let read = reader
                    .read_until(b'\n', &mut raw)
                    .with_path(&config.input_path)?;
                if read == 0 {
                    break;
                }
                replayed = true;
                if file_done(config, state.started, &file) {
                    break 'replay;
                }

                let synthetic = clock.tick();
                let timestamp = if throttle.is_enabled() {
                    Utc::now()
                } else {
                    synthetic
                };
                let template_line = String::from_utf8_lossy(&raw);
                let line = render_line(
                    template_line.trim_end_matches(['\n', '\r']),
                    state.next_event,
                    timestamp,
                    config,
                );

                if let Some(pause) = throttle.admit(line.len()) {
                    out.flush().with_path(path)?;
                    std::thread::sleep(pause);
                }

                let len = line.len() as u64;
                if config.max_file_bytes != 0 && file.bytes + len >= config.max_file_bytes {
                    break 'replay;
                }
                out.write_all(line.as_bytes()).with_path(path)?;
                file.bytes += len;
                file.events += 1;
                state.events += 1;
                state.bytes += len;
                state.next_event += 1;

                if let Some(sink) = progress.as_mut() {
                    report_progress(sink, config, path, state, &file);
                }
            }

            if !replayed {
                return Err(Error::EmptyTemplate {
                    path: config.input_path.clone(),
                });
            }
        }

        out.flush().with_path(path)
    }
}

fn report_progress(
    sink: &mut ProgressSink,
    config: &GeneratorConfig,
    path: &Path,
    state: &mut GenerationState,
    file: &FileState,
) {
    if state.last_report.elapsed() < config.progress_interval {
        return;
    }
    state.last_report = Instant::now();

    let percent =
        |done: u64, budget: u64| (budget != 0).then(|| done as f64 / budget as f64 * 100.0);
    sink(&Progress {
        file: path.to_path_buf(),
        by_size: percent(file.bytes, config.max_file_bytes),
        by_events: percent(file.events, config.max_events),
    });
}

/// Builds one output line, newline included.
///
/// The marker for `event` replaces the first field token, or is prepended
/// with a space; the timestamp is then applied the same way.
///
/// # Panics
///
/// Panics if `config.timestamp_format` is not a valid strftime format.
/// [`check_timestamp_format`](crate::check_timestamp_format) rejects such
/// formats up front; [`DataGenerator::generate`] runs it before any line is
/// rendered.
pub fn render_line(
    template: &str,
    event: u64,
    timestamp: DateTime<Utc>,
    config: &GeneratorConfig,
) -> String {
    let marked = substitute(template, config.field_token.as_deref(), &marker(event));
    let stamp = timestamp.format(&config.timestamp_format).to_string();
    let mut line = substitute(&marked, config.timestamp_token.as_deref(), &stamp);
    line.push('\n');
    line
}

fn substitute(line: &str, token: Option<&str>, value: &str) -> String {
    match token {
        Some(token) if !token.is_empty() && line.contains(token) => line.replacen(token, value, 1),
        _ => format!("{value} {line}"),
    }
}

struct GenerationState {
    started: Instant,
    next_event: u64,
    events: u64,
    bytes: u64,
    last_report: Instant,
}

#[derive(Default)]
struct FileState {
    events: u64,
    bytes: u64,
}

fn runtime_exhausted(config: &GeneratorConfig, started: Instant) -> bool {
    !config.max_runtime.is_zero() && started.elapsed() >= config.max_runtime
}

fn file_done(config: &GeneratorConfig, started: Instant, file: &FileState) -> bool {
    runtime_exhausted(config, started)
        || (config.max_events != 0 && file.events >= config.max_events)
        || (config.max_file_bytes != 0 && file.bytes >= config.max_file_bytes)
}

/// Truncates or creates the file so that the fill can append.
fn prepare_output(path: &Path, overwrite: bool) -> Result<()> {
    let exists = path.exists();
    match (overwrite, exists) {
        (true, true) => tracing::info!("Overwriting {}", path.display()),
        (true, false) => tracing::info!("Nothing to overwrite. Creating new file {}", path.display()),
        (false, true) => tracing::info!("Appending {}", path.display()),
        (false, false) => tracing::info!("Nothing to append. Creating new file {}", path.display()),
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(overwrite)
        .open(path)
        .with_path(path)?;
    Ok(())
}
