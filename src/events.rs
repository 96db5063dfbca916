//! Run event stream.
//!
//! Every observable step of a run is published as an [`Event`] with a
//! strictly increasing sequence number. The [`EventStream`] assigns the
//! number and fans the event out to each attached [`EventSink`]:
//! - [`NdjsonSink`] appends one JSON object per line to
//!   `.promptfan/events.ndjson` and syncs after every write
//! - [`MemorySink`] keeps events in a shared buffer for embedders and tests
//! - [`ConsoleSink`] prints human-readable progress
//!
//! # Event Format
//!
//! ```text
//! {"seq":0,"ts":"2026-01-01T00:00:00Z","event":"init","job":"demo","actor":"me@host","roots":2}
//! {"seq":1,"ts":"...","event":"block_start","path":"0"}
//! {"seq":2,"ts":"...","event":"stage","stage":"pre","path":"0","id":0,"time_ms":3}
//! ```

use crate::error::{PromptfanError, Result};
use crate::tree::{BlockPath, BlockState, RunStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Payload of an event, tagged by `event` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Init {
        job: String,
        actor: String,
        roots: usize,
    },
    BlockStart {
        path: BlockPath,
    },
    CompositionComplete {
        path: BlockPath,
        id: u64,
    },
    BlockComplete {
        path: BlockPath,
        state: BlockState,
    },
    Stage {
        stage: String,
        path: BlockPath,
        id: Option<u64>,
        time_ms: u64,
    },
    RunComplete {
        stats: RunStats,
    },
    Error {
        path: BlockPath,
        id: Option<u64>,
        message: String,
    },
}

impl EventKind {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Init { .. } => "init",
            EventKind::BlockStart { .. } => "block_start",
            EventKind::CompositionComplete { .. } => "composition_complete",
            EventKind::BlockComplete { .. } => "block_complete",
            EventKind::Stage { .. } => "stage",
            EventKind::RunComplete { .. } => "run_complete",
            EventKind::Error { .. } => "error",
        }
    }
}

/// One published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Strictly increasing within a run.
    pub seq: u64,

    /// RFC3339 timestamp when the event was published.
    pub ts: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            PromptfanError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Receives every event of a run, in order.
pub trait EventSink {
    fn record(&mut self, event: &Event) -> Result<()>;
}

/// Sequences events and fans them out to sinks.
#[derive(Default)]
pub struct EventStream {
    next_seq: u64,
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Stamp and publish an event.
    ///
    /// A sink failure is returned to the caller; sinks after the failing one
    /// do not see the event.
    pub fn emit(&mut self, kind: EventKind) -> Result<Event> {
        let event = Event {
            seq: self.next_seq,
            ts: Utc::now(),
            kind,
        };
        self.next_seq += 1;
        for sink in &mut self.sinks {
            sink.record(&event)?;
        }
        Ok(event)
    }
}

/// Appends events to an NDJSON file.
#[derive(Debug, Clone)]
pub struct NdjsonSink {
    path: PathBuf,
}

impl NdjsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for NdjsonSink {
    fn record(&mut self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                PromptfanError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PromptfanError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        file.sync_all().map_err(|e| {
            PromptfanError::UserError(format!(
                "failed to sync events file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

/// Shared in-memory buffer; clones see the same events.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Prints block-level progress to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    /// Also print stage and composition events.
    pub verbose: bool,
}

impl ConsoleSink {
    /// Human-readable line for an event, or `None` when it is not shown.
    pub fn format(&self, event: &Event) -> Option<String> {
        match &event.kind {
            EventKind::Init { job, roots, .. } => {
                Some(format!("Running job '{}' ({} root block(s))", job, roots))
            }
            EventKind::BlockStart { path } => Some(format!("  [{}] started", path)),
            EventKind::BlockComplete { path, state } => Some(format!("  [{}] {}", path, state)),
            EventKind::Error { path, id, message } => Some(match id {
                Some(id) => format!("  [{}] composition {} failed: {}", path, id, message),
                None => format!("  [{}] failed: {}", path, message),
            }),
            EventKind::CompositionComplete { path, id } if self.verbose => {
                Some(format!("  [{}] composition {} done", path, id))
            }
            EventKind::Stage {
                stage,
                path,
                id,
                time_ms,
            } if self.verbose => Some(format!(
                "  [{}] {} {} ({} ms)",
                path,
                stage,
                id.map(|i| format!("#{}", i)).unwrap_or_default(),
                time_ms
            )),
            EventKind::RunComplete { stats } => Some(format!(
                "Done: {} composition(s), {} complete, {} failed, {} blocked, {} cancelled",
                stats.compositions_completed,
                stats.complete,
                stats.failed,
                stats.blocked,
                stats.cancelled
            )),
            _ => None,
        }
    }
}

impl EventSink for ConsoleSink {
    fn record(&mut self, event: &Event) -> Result<()> {
        if let Some(line) = self.format(event) {
            println!("{}", line);
        }
        Ok(())
    }
}

/// Get the actor string for the `init` event.
pub fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
