//! Timing events, warnings and run statistics

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COMPUTATION_TIME_MS: &str = "computation_time_ms";
pub const MESH_TIME_MS: &str = "mesh_time_ms";

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Timing { name: &'static str, elapsed: Duration },
    Warning(String),
    Error(String),
}

/// Fire-and-forget destination for core events.
///
/// Implementations must return promptly and never fail the caller.
pub trait TelemetrySink: Send {
    fn emit(&self, event: TelemetryEvent);
}

/// Sink forwarding every event to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Timing { name, elapsed } => {
                log::info!("{}={}", name, elapsed.as_millis())
            }
            TelemetryEvent::Warning(message) => log::warn!("{}", message),
            TelemetryEvent::Error(message) => log::error!("{}", message),
        }
    }
}

/// Sink buffering events in memory; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Warning(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn timings(&self, name: &str) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Timing { name: n, elapsed } if n == name => Some(elapsed),
                _ => None,
            })
            .collect()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        // Contended or poisoned buffer: drop the event rather than block
        if let Ok(mut events) = self.events.try_lock() {
            events.push(event);
        }
    }
}

/// Counters reported by a simulation instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub generation: u64,
    pub steps_completed: u64,
    pub mesh_updates_completed: u64,
    pub meshes_uploaded: u64,
    pub last_computation_ms: Option<u128>,
    pub last_mesh_ms: Option<u128>,
    pub last_changed_cells: usize,
    pub living_cells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters() {
        let sink = MemoryTelemetry::new();
        let shared = sink.clone();
        sink.emit(TelemetryEvent::Timing {
            name: COMPUTATION_TIME_MS,
            elapsed: Duration::from_millis(5),
        });
        sink.emit(TelemetryEvent::Warning("busy".to_string()));
        sink.emit(TelemetryEvent::Error("failed".to_string()));

        assert_eq!(shared.events().len(), 3);
        assert_eq!(shared.warnings(), vec!["busy".to_string()]);
        assert_eq!(shared.errors(), vec!["failed".to_string()]);
        assert_eq!(shared.timings(COMPUTATION_TIME_MS), vec![Duration::from_millis(5)]);
        assert!(shared.timings(MESH_TIME_MS).is_empty());
    }

    #[test]
    fn test_log_sink_never_fails() {
        LogTelemetry.emit(TelemetryEvent::Warning("no logger installed".to_string()));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = SimulationStats {
            generation: 3,
            last_computation_ms: Some(12),
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"generation\":3"));
        let back: SimulationStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
