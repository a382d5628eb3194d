//! Message triage pipeline.
//!
//! Every accepted message flows through:
//! 1. `matcher::match_intent()` — first rule whose keyword threshold is met
//! 2. `EntityExtractor::extract()` — regex / passthrough entities for that rule
//! 3. `mapper::build_parameters()` — entities + channel → procedure parameters
//! 4. `ActionExecutor::execute()` — the (simulated) stored procedure
//!
//! Any failure becomes a manual review record. `Dispatcher` decouples all of
//! this from the request that delivered the message.

pub mod dispatcher;
pub mod extractor;
pub mod mapper;
pub mod matcher;
pub mod processor;
pub mod types;

pub use dispatcher::{DispatchSnapshot, Dispatcher};
pub use extractor::{EntityExtractor, EntityRegistry};
pub use processor::MessageProcessor;
pub use types::{IncomingMessage, ManualReviewRecord, PipelineOutcome};
