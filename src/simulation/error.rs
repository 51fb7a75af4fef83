use super::tasks::TaskFailure;
use crate::game_of_life::GridError;
use thiserror::Error;

/// Errors raised by the simulation core.
///
/// `OutOfBounds` and `Busy` are recoverable and only abort the call that hit
/// them. `WorkerFailed` halts the scheduler: the partial generation is
/// discarded and no further work is dispatched.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    OutOfBounds(#[from] GridError),

    #[error("cannot {operation} while the simulation is busy")]
    Busy { operation: &'static str },

    #[error("work unit {unit} failed: {message}")]
    WorkerFailed { unit: usize, message: String },

    #[error("scheduler halted after a worker failure")]
    Halted,

    #[error("{name} must be within 1..={max}, got {value}")]
    InvalidUnitSize {
        name: &'static str,
        value: usize,
        max: usize,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SimulationError {
    /// Whether the caller may simply retry later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimulationError::OutOfBounds(_) | SimulationError::Busy { .. })
    }
}

impl From<TaskFailure> for SimulationError {
    fn from(failure: TaskFailure) -> Self {
        SimulationError::WorkerFailed {
            unit: failure.unit,
            message: failure.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_of_life::Dimensions;

    #[test]
    fn test_recoverable_kinds() {
        let bounds = SimulationError::from(GridError::OutOfBounds {
            x: -1,
            y: 0,
            z: 0,
            dimensions: Dimensions::cube(3),
        });
        assert!(bounds.is_recoverable());
        assert!(SimulationError::Busy { operation: "set a block" }.is_recoverable());
        assert!(!SimulationError::Halted.is_recoverable());
    }

    #[test]
    fn test_task_failure_conversion() {
        let error = SimulationError::from(TaskFailure {
            unit: 4,
            message: "boom".to_string(),
        });
        assert!(!error.is_recoverable());
        assert_eq!(error.to_string(), "work unit 4 failed: boom");
    }
}
