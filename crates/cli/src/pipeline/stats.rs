//! Pipeline statistics and run report.

use std::time::Duration;

use contracts::ChannelStatus;
use dispatcher::MetricsSnapshot;
use ingestion::CaptureSnapshot;
use observability::SyncMetricsAggregator;
use serde::Serialize;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Engine metrics aggregator
    pub sync_metrics: SyncMetricsAggregator,

    /// Channel status after the last event
    pub final_status: Option<ChannelStatus>,

    /// Cycle angle interpolated at the end of the run (None = not synchronized)
    pub final_cycle_angle: Option<u32>,

    /// Capture timer counters
    pub capture: CaptureSnapshot,

    /// Per link target delivery counters
    pub links: Vec<(String, MetricsSnapshot)>,

    /// Cam log resets seen by the cam logger (None = no cam channel)
    pub cam_log_resets: Option<u64>,

    /// Re-initializations seen by each dependent channel
    pub dependents: Vec<(String, u64)>,

    /// Accepted / rejected Confirm-Sync replies
    pub host_replies: u64,
    pub host_rejections: u64,
}

/// JSON form of a run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub duration_secs: f64,
    pub edges: u64,
    pub timeouts: u64,
    pub edges_ignored: u64,
    pub eng_pos: String,
    pub state: Option<String>,
    /// Teeth were being counted when the run ended
    pub counting: bool,
    pub cycle_angle: Option<u32>,
    pub error_flags: Vec<&'static str>,
    pub first_full_sync_at: Option<u64>,
    pub cycles: u64,
    pub sync_losses: u64,
    pub trr_mean: Option<f64>,
    pub interrupts: Vec<(&'static str, u64)>,
    pub host_replies: u64,
    pub host_rejections: u64,
    pub cam_log_resets: Option<u64>,
    pub dependents: Vec<(String, u64)>,
    pub links: Vec<LinkReport>,
}

#[derive(Debug, Serialize)]
pub struct LinkReport {
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl PipelineStats {
    pub fn report(&self) -> RunReport {
        let summary = self.sync_metrics.summary();
        RunReport {
            duration_secs: self.duration.as_secs_f64(),
            edges: summary.total_edges,
            timeouts: summary.total_timeouts,
            edges_ignored: self.capture.edges_ignored,
            eng_pos: summary.final_eng_pos.to_string(),
            state: self.final_status.as_ref().map(|s| s.state.to_string()),
            counting: self
                .final_status
                .as_ref()
                .is_some_and(|s| s.state.is_counting()),
            cycle_angle: self.final_cycle_angle,
            error_flags: self
                .final_status
                .as_ref()
                .map(|s| s.error.labels().collect())
                .unwrap_or_default(),
            first_full_sync_at: summary.first_full_sync_at,
            cycles: summary.cycles,
            sync_losses: summary.sync_losses,
            trr_mean: (summary.trr.count > 0).then_some(summary.trr.mean),
            interrupts: summary.interrupt_counts.into_iter().collect(),
            host_replies: self.host_replies,
            host_rejections: self.host_rejections,
            cam_log_resets: self.cam_log_resets,
            dependents: self.dependents.clone(),
            links: self
                .links
                .iter()
                .map(|(name, snapshot)| LinkReport {
                    name: name.clone(),
                    delivered: snapshot.delivered_count,
                    failed: snapshot.failure_count,
                    dropped: snapshot.dropped_count,
                })
                .collect(),
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.sync_metrics.summary());

        println!("\n=== Run ===");
        println!("Duration: {:.3}s", self.duration.as_secs_f64());
        println!("Edges ignored by the capture window: {}", self.capture.edges_ignored);
        if let Some(ref status) = self.final_status {
            println!("Final state: {} / {}", status.state, status.eng_pos);
            println!("Error flags: {:?}", status.error.labels().collect::<Vec<_>>());
            println!("TRR: {}", status.trr);
        }
        if let Some(angle) = self.final_cycle_angle {
            println!("Cycle angle at end: {} ticks", angle);
        }
        println!(
            "Host replies: {} accepted, {} rejected",
            self.host_replies, self.host_rejections
        );

        if let Some(resets) = self.cam_log_resets {
            println!("Cam log resets: {}", resets);
        }
        for (name, count) in &self.dependents {
            println!("Dependent '{}' re-initialized: {}", name, count);
        }
        if !self.links.is_empty() {
            println!("\n=== Link Targets ===");
            for (name, snapshot) in &self.links {
                println!(
                    "  {}: delivered={}, failed={}, dropped={}",
                    name, snapshot.delivered_count, snapshot.failure_count, snapshot.dropped_count
                );
            }
        }
        println!();
    }
}
