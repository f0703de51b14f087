//! Pipeline components: channels, producer, workers, aggregator, orchestration.

pub mod aggregator;
pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod producer;
pub mod sink;
pub mod worker;

pub use aggregator::{Totals, aggregate};
pub use context::{PipelineChannels, PipelineTuning, create_pipeline_channels};
pub use error_handler::{
    PipelineError, SinkError, TransformError, log_failed_items, report_item_failure,
    truncate_diagnostic,
};
pub use orchestrator::run_pipeline;
pub use producer::{ProducerSnapshot, ProducerStats, run_stream_loop, spawn_producer_thread};
pub use sink::{Producer, Sink, SinkTransaction, Transform};
pub use worker::{spawn_workers, worker_loop};
