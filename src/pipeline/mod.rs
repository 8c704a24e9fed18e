//! Inference Pipeline Module
//!
//! ```text
//! RecordSource ──fetch──▶ raw records ──▶ InferencePipeline::analyze_records ──▶ InferenceReport ──▶ ReportSink
//! ```
//!
//! One invocation handles one device and one batch. There is no retry and no
//! streaming: a failed or late fetch fails the invocation.

mod coordinator;
pub mod source;

pub use coordinator::{InferencePipeline, PipelineError, PipelineStage};
pub use source::{HttpRecordSource, RecordSource, StaticRecordSource};
