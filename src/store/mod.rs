//! Action execution and exception recording backends.

pub mod simulated;
pub mod traits;

pub use simulated::SimulatedDatabase;
pub use traits::{ActionExecutor, ExceptionRecorder};
