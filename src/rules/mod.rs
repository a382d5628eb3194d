//! Intent rule configuration.
//!
//! Rules are loaded once at startup into an immutable `RuleSet`, which is then
//! shared behind an `Arc` by every request. Edits to the document require a
//! restart.

pub mod loader;
pub mod model;

pub use loader::{TriageConfig, load_config, parse_config};
pub use model::{ActionDescriptor, DetectionRules, IntentRule, ParamsMap, RuleSet};
