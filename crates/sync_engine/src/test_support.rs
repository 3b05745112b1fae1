//! Helpers for driving the engine over synthetic edge lists in unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::{
    ChannelSet, CrankConfig, DependentConfig, DependentKind, HostRequest, InterruptCause,
    LinkConfig, LinkMessage, Polarity, ToothEvent,
};
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};

use crate::{CrankEngine, CrankParams, StepActions};

pub(crate) const TICKS: u32 = 1024;
pub(crate) const CAM: u8 = 2;

/// 60-2 wheel, gap must exceed 1.5 periods.
pub(crate) fn crank_config() -> CrankConfig {
    CrankConfig {
        teeth_till_gap: 58,
        teeth_in_gap: 2,
        teeth_per_sync: 60,
        teeth_per_cycle: 120,
        gap_ratio: 1.0 / 1.5,
        win_ratio_normal: 0.25,
        tcr2_ticks_per_tooth: TICKS,
        ..CrankConfig::default()
    }
}

pub(crate) fn link_config() -> LinkConfig {
    LinkConfig {
        cam_channel: Some(CAM),
        dependents: vec![
            DependentConfig {
                name: "fuel".into(),
                channel: 5,
                kind: DependentKind::Fuel,
            },
            DependentConfig {
                name: "spark".into(),
                channel: 6,
                kind: DependentKind::Spark,
            },
        ],
        ..LinkConfig::default()
    }
}

pub(crate) fn engine_with(crank: CrankConfig) -> CrankEngine {
    let mut engine = CrankEngine::new(CrankParams::from_config(&crank, &link_config()));
    engine
        .handle_host_request(HostRequest::Initialize)
        .expect("initialize");
    engine
}

pub(crate) fn engine() -> CrankEngine {
    engine_with(crank_config())
}

/// Edge times of a gapped wheel, starting at `first_tooth` (1 = first tooth after the gap).
pub(crate) fn gapped_wheel(
    teeth_till_gap: u32,
    teeth_in_gap: u32,
    period: u32,
    first_tooth: u32,
    count: usize,
) -> Vec<u32> {
    let mut time = 10_000u32;
    let mut tooth = first_tooth;
    let mut edges = Vec::with_capacity(count);
    for _ in 0..count {
        edges.push(time);
        if tooth == teeth_till_gap {
            time += period * (teeth_in_gap + 1);
            tooth = 1;
        } else {
            time += period;
            tooth += 1;
        }
    }
    edges
}

#[derive(Debug, Default)]
pub(crate) struct Trace {
    /// (edge index, or None for a timeout, actions)
    pub steps: Vec<(Option<usize>, StepActions)>,
}

impl Trace {
    pub fn interrupts(&self) -> Vec<(Option<usize>, InterruptCause)> {
        self.steps
            .iter()
            .flat_map(|(index, actions)| actions.interrupts().map(move |cause| (*index, cause)))
            .collect()
    }

    pub fn links(&self, message: LinkMessage) -> Vec<(Option<usize>, ChannelSet)> {
        self.steps
            .iter()
            .flat_map(|(index, actions)| {
                actions
                    .links()
                    .filter(move |(_, m)| *m == message)
                    .map(move |(targets, _)| (*index, targets))
            })
            .collect()
    }

    pub fn timeouts(&self) -> usize {
        self.steps.iter().filter(|(index, _)| index.is_none()).count()
    }
}

/// Feed `edges` through the engine the way the capture timer would: pending
/// timeouts first, edges outside the armed window ignored.
pub(crate) fn drive_with<F>(engine: &mut CrankEngine, edges: &[u32], mut host: F) -> Trace
where
    F: FnMut(&mut CrankEngine, &StepActions),
{
    let mut trace = Trace::default();
    for (index, &time) in edges.iter().enumerate() {
        while let Some(close) = engine.armed_window().closes_at {
            if close >= time {
                break;
            }
            let actions = engine.on_timeout(close);
            host(engine, &actions);
            trace.steps.push((None, actions));
        }
        if engine.armed_window().accepts(time) {
            let actions = engine.on_edge(ToothEvent::new(time, Polarity::Falling));
            host(engine, &actions);
            trace.steps.push((Some(index), actions));
        }
    }
    trace
}

pub(crate) fn drive(engine: &mut CrankEngine, edges: &[u32]) -> Trace {
    drive_with(engine, edges, |_, _| {})
}

/// Recorder that tallies `crank_sync_errors_total` increments per flag label.
#[derive(Debug, Default)]
pub(crate) struct ErrorCounts(Arc<Mutex<HashMap<String, u64>>>);

impl ErrorCounts {
    pub fn get(&self, flag: &str) -> u64 {
        self.0.lock().unwrap().get(flag).copied().unwrap_or(0)
    }
}

struct FlagCounter {
    flag: String,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl CounterFn for FlagCounter {
    fn increment(&self, value: u64) {
        *self.counts.lock().unwrap().entry(self.flag.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        self.counts.lock().unwrap().insert(self.flag.clone(), value);
    }
}

impl Recorder for ErrorCounts {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        if key.name() != "crank_sync_errors_total" {
            return Counter::noop();
        }
        let flag = key
            .labels()
            .find(|label| label.key() == "flag")
            .map(|label| label.value().to_owned())
            .unwrap_or_default();
        Counter::from_arc(Arc::new(FlagCounter {
            flag,
            counts: Arc::clone(&self.0),
        }))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
