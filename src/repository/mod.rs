//! Per-report state shared between the files of one dataset run.

pub mod common_data;
pub mod ids;

pub use common_data::{
    CommonDataRepository, FromToScheduledStopPointId, InMemoryCommonDataRepository,
};
pub use ids::{InMemoryNetexIdRepository, NetexIdRepository};
