//! Pipeline orchestrator - wires the capture timer, engine, host and link dispatcher.
//!
//! The engine step loop is synchronous; only the link targets run as tasks.

use std::path::PathBuf;
use std::time::Instant;

use contracts::{ChannelEvent, EngineBlueprint, HostRequest, SimulationConfig};
use dispatcher::{DispatcherBuilder, LinkDispatcher};
use ingestion::{SimCaptureTimer, TraceEdge, WheelTrace};
use observability::{
    record_channel_event, record_channel_status, record_host_request, record_interrupt,
    record_link_dispatched,
};
use sync_engine::{CrankEngine, CrankParams, StepActions};
use tracing::{debug, info, instrument, warn};

use super::{PipelineStats, ScriptedHost};
use crate::error::Result;

/// Where the tooth edges come from
#[derive(Debug, Clone)]
pub enum TraceSource {
    /// Recorded trace file
    Recorded(PathBuf),
    /// Synthetic wheel built from the crank geometry
    Synthetic(SimulationConfig),
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: EngineBlueprint,

    pub trace: TraceSource,

    /// Maximum number of engine events (None = until the trace is exhausted)
    pub max_events: Option<u64>,

    /// Keep stepping on timeouts after the last edge, as if the engine stopped
    pub run_out: bool,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Load or synthesize the edge list
    pub fn load_edges(&self) -> Result<Vec<TraceEdge>> {
        match &self.config.trace {
            TraceSource::Recorded(path) => Ok(ingestion::read_trace(path)?),
            TraceSource::Synthetic(simulation) => {
                Ok(WheelTrace::from_config(&self.config.blueprint.crank, simulation).build())
            }
        }
    }

    /// Run the engine until the trace is exhausted
    #[instrument(name = "pipeline_run", skip(self))]
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let edges = self.load_edges()?;
        info!(edges = edges.len(), "Trace loaded");

        let mut engine = CrankEngine::new(CrankParams::from_blueprint(blueprint));
        let (dispatcher, collaborators) =
            DispatcherBuilder::new(blueprint.links.clone(), engine.view()).build()?;
        info!(
            channels = dispatcher.channels().len(),
            "Link dispatcher started"
        );

        let mut timer = SimCaptureTimer::new(edges);
        let mut host = ScriptedHost::new(blueprint.host.clone());
        let mut stats = PipelineStats::default();

        let initialize = HostRequest::Initialize;
        let actions = engine.handle_host_request(initialize)?;
        record_host_request(&initialize, true);
        apply_actions(&actions, &mut timer, &dispatcher, &mut host, &mut stats)?;

        while let Some(event) = timer.next_event()? {
            record_channel_event(&event);
            stats.sync_metrics.record_event(&event);

            let actions = engine.step(event);
            apply_actions(&actions, &mut timer, &dispatcher, &mut host, &mut stats)?;

            if matches!(event, ChannelEvent::Edge(_)) {
                if let Some(request) = host.on_tooth() {
                    match engine.handle_host_request(request) {
                        Ok(actions) => {
                            record_host_request(&request, true);
                            stats.host_replies += 1;
                            apply_actions(&actions, &mut timer, &dispatcher, &mut host, &mut stats)?;
                        }
                        Err(e) => {
                            record_host_request(&request, false);
                            stats.host_rejections += 1;
                            warn!(error = %e, "Host reply rejected");
                        }
                    }
                }
            }

            let status = engine.status();
            record_channel_status(&status);
            stats.sync_metrics.update(&status);

            // let the link workers drain their queues
            tokio::task::yield_now().await;

            if let Some(max) = self.config.max_events {
                if stats.sync_metrics.total_events() >= max {
                    info!(events = max, "Reached max events limit");
                    break;
                }
            }
            if timer.remaining() == 0 && !self.config.run_out {
                debug!("Trace exhausted");
                break;
            }
        }

        stats.final_status = Some(engine.status());
        // the engine sees the wrapping 32-bit TCR1 value
        stats.final_cycle_angle = engine.view().cycle_angle_at(timer.now() as u32);
        stats.capture = timer.metrics().snapshot();

        info!("Shutting down link dispatcher...");
        stats.links = dispatcher.shutdown().await;
        stats.cam_log_resets = collaborators.cam_log.as_ref().map(|log| log.reset_count());
        stats.dependents = collaborators
            .dependents
            .iter()
            .map(|(name, status)| (name.clone(), status.reinitializations()))
            .collect();
        stats.duration = start_time.elapsed();

        info!(
            events = stats.sync_metrics.total_events(),
            eng_pos = %engine.eng_pos(),
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline finished"
        );

        Ok(stats)
    }
}

/// Hand one batch of engine actions to the timer, the host and the link targets
fn apply_actions(
    actions: &StepActions,
    timer: &mut SimCaptureTimer,
    dispatcher: &LinkDispatcher,
    host: &mut ScriptedHost,
    stats: &mut PipelineStats,
) -> Result<()> {
    let applied = timer.apply(actions.iter())?;

    for cause in applied.interrupts {
        debug!(cause = observability::interrupt_label(cause), "Host interrupt");
        record_interrupt(cause);
        stats.sync_metrics.record_interrupt(cause);
        host.on_interrupt(cause);
    }

    for (targets, message) in applied.links {
        let requested = targets.intersection(dispatcher.channels()).len();
        let delivered = dispatcher.notify(targets, message);
        record_link_dispatched(message, requested, delivered);
        stats.sync_metrics.record_link(requested, delivered);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        CrankConfig, DependentConfig, DependentKind, EngPosState, ErrorFlags, HostConfig,
        LinkConfig,
    };

    fn blueprint(host: HostConfig) -> EngineBlueprint {
        EngineBlueprint {
            version: Default::default(),
            crank: CrankConfig::default(),
            links: LinkConfig {
                cam_channel: Some(2),
                dependents: vec![DependentConfig {
                    name: "fuel".into(),
                    channel: 5,
                    kind: DependentKind::Fuel,
                }],
                ..LinkConfig::default()
            },
            host,
            simulation: None,
        }
    }

    fn pipeline(host: HostConfig, simulation: SimulationConfig) -> Pipeline {
        Pipeline::new(PipelineConfig {
            blueprint: blueprint(host),
            trace: TraceSource::Synthetic(simulation),
            max_events: None,
            run_out: false,
        })
    }

    #[tokio::test]
    async fn test_reaches_full_sync_with_answering_host() {
        let host = HostConfig {
            tcr2_adjustment: Some(0),
            respond_after_teeth: 0,
            undecided_replies: 0,
        };
        let simulation = SimulationConfig {
            start_time: 10_000,
            revolutions: 6,
            ..SimulationConfig::default()
        };
        let stats = pipeline(host, simulation).run().await.unwrap();

        let status = stats.final_status.as_ref().unwrap();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(stats.report().counting);
        let angle = stats.final_cycle_angle.unwrap();
        assert!(angle < 120 * 1024);
        assert_eq!(stats.host_replies, 1);
        assert_eq!(stats.sync_metrics.sync_losses, 0);
        assert_eq!(stats.sync_metrics.cycles, 1);
        assert!(status.error.is_empty());
        assert_eq!(stats.dependents, vec![("fuel".to_string(), 0)]);
        // first-half sync plus one cycle start
        assert_eq!(stats.cam_log_resets, Some(2));
    }

    #[tokio::test]
    async fn test_silent_host_keeps_reverting() {
        let simulation = SimulationConfig {
            start_time: 10_000,
            revolutions: 6,
            ..SimulationConfig::default()
        };
        let stats = pipeline(HostConfig::default(), simulation).run().await.unwrap();

        let summary = stats.sync_metrics.summary();
        assert_eq!(summary.first_full_sync_at, None);
        assert!(summary.interrupt_counts.get("pre_full_sync").copied().unwrap_or(0) >= 2);
        assert_eq!(stats.host_replies, 0);
    }

    #[tokio::test]
    async fn test_dropped_teeth_stall_and_reinitialize_dependents() {
        let host = HostConfig {
            tcr2_adjustment: Some(0),
            ..HostConfig::default()
        };
        let simulation = SimulationConfig {
            start_time: 10_000,
            revolutions: 6,
            dropped_edges: vec![200, 201],
            ..SimulationConfig::default()
        };
        let stats = pipeline(host, simulation).run().await.unwrap();

        assert_eq!(stats.sync_metrics.sync_losses, 1);
        let status = stats.final_status.unwrap();
        assert!(status.error.contains(ErrorFlags::STALL));
        assert_eq!(stats.dependents, vec![("fuel".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_run_out_stalls_after_last_edge() {
        let host = HostConfig {
            tcr2_adjustment: Some(0),
            ..HostConfig::default()
        };
        let simulation = SimulationConfig {
            start_time: 10_000,
            revolutions: 6,
            ..SimulationConfig::default()
        };
        let mut pipeline = pipeline(host, simulation);
        pipeline.config.run_out = true;
        pipeline.config.max_events = Some(1_000);
        let stats = pipeline.run().await.unwrap();

        let status = stats.final_status.unwrap();
        assert_eq!(status.eng_pos, EngPosState::Seek);
        assert!(status.error.contains(ErrorFlags::STALL));
        assert_eq!(stats.sync_metrics.sync_losses, 1);
        assert_eq!(stats.dependents, vec![("fuel".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_max_events_stops_early() {
        let mut pipeline = pipeline(HostConfig::default(), SimulationConfig::default());
        pipeline.config.max_events = Some(10);
        let stats = pipeline.run().await.unwrap();
        assert_eq!(stats.sync_metrics.total_events(), 10);
    }
}
