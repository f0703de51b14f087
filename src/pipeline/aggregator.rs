//! Aggregator: the single owner of the running total.

use crossbeam_channel::Receiver;
use log::debug;

use crate::SourceId;
use crate::types::Report;

use super::error_handler::PipelineError;

/// What the aggregator saw before every worker finished.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub total: usize,
    pub items: usize,
    pub failed: Vec<SourceId>,
    pub workers_done: usize,
}

/// Sum `Count` reports until `worker_count` `WorkerDone` sentinels have arrived.
/// `on_item` is called once per item report with that item's count (0 for failures).
pub fn aggregate(
    report_rx: &Receiver<Report>,
    worker_count: usize,
    on_item: Option<&dyn Fn(usize)>,
) -> Result<Totals, PipelineError> {
    let mut totals = Totals::default();
    while totals.workers_done < worker_count {
        let report = report_rx.recv().map_err(|_| PipelineError::ChannelClosed {
            done: totals.workers_done,
            expected: worker_count,
        })?;
        let count = match report {
            Report::WorkerDone => {
                totals.workers_done += 1;
                debug!(
                    "aggregator: {}/{} workers done",
                    totals.workers_done, worker_count
                );
                continue;
            }
            Report::Count(n) => n,
            Report::Failed(source_id) => {
                totals.failed.push(source_id);
                0
            }
        };
        totals.total += count;
        totals.items += 1;
        if let Some(cb) = on_item {
            cb(count);
        }
    }
    Ok(totals)
}
