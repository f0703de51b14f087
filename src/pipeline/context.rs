//! Pipeline tuning and channel wiring: the bounded input channel and the result channel.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::types::{Input, Report};

use super::error_handler::PipelineError;

/// Worker count, input channel capacity, and an optional item-count hint.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    pub num_workers: usize,
    /// Capacity of the input channel. Too small serializes the pipeline; too large lets the
    /// producer buffer far ahead of the workers.
    pub channel_cap: usize,
    /// Number of work items the source is expected to yield, when known up front.
    /// Used for the progress total and a sanity check at the end of the run; never for termination.
    pub expected_items: Option<usize>,
}

impl PipelineTuning {
    pub fn new(num_workers: usize, channel_cap: usize) -> Self {
        Self {
            num_workers,
            channel_cap,
            expected_items: None,
        }
    }

    pub fn with_expected_items(mut self, expected: usize) -> Self {
        self.expected_items = Some(expected);
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.num_workers == 0 {
            return Err(PipelineError::InvalidTuning("worker count must be positive"));
        }
        if self.channel_cap == 0 {
            return Err(PipelineError::InvalidTuning(
                "channel capacity must be positive",
            ));
        }
        Ok(())
    }
}

/// Channels for one run. The producer gets `input_tx`; workers get `input_rx` and `report_tx`;
/// the aggregator gets `report_rx`. Never reused after the run.
pub struct PipelineChannels<S> {
    pub input_tx: Sender<Input<S>>,
    pub input_rx: Receiver<Input<S>>,
    pub report_tx: Sender<Report>,
    pub report_rx: Receiver<Report>,
}

pub fn create_pipeline_channels<S>(tuning: &PipelineTuning) -> PipelineChannels<S> {
    let (input_tx, input_rx) = bounded::<Input<S>>(tuning.channel_cap);
    let (report_tx, report_rx) = unbounded::<Report>();
    PipelineChannels {
        input_tx,
        input_rx,
        report_tx,
        report_rx,
    }
}
