// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod collector;
mod orchestrator;
mod report;

pub use collector::{CollectStats, DailyCollector};
pub use orchestrator::{Pipeline, PipelineParts};
pub use report::CycleReport;
