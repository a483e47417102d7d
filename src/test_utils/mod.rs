/// A scripted in-memory driver for exercising the executor without a database
pub mod scripted;

/// Helper utilities for building rows in tests
pub mod test_helpers;

pub use scripted::{DriverLog, FailPoint, ScriptedDriver, ScriptedEvent, ScriptedExecution};
pub use test_helpers::create_test_row;
