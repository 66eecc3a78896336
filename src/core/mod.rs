//! Core engine modules for Invigil

pub mod aggregator;
pub mod api;
pub mod policy;
pub mod registry;
pub mod sink;
pub mod source;
pub mod tracker;

pub use aggregator::SessionAggregator;
pub use api::{create_router, run_server};
pub use policy::PolicyTable;
pub use registry::SessionRegistry;
pub use sink::{EventSink, MemorySink};
pub use source::{FixedSource, ObservationSource, ScriptedSource};
pub use tracker::{Firing, ViolationTracker};
