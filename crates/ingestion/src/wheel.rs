//! 合成齿信号
//!
//! 根据齿盘几何生成边沿时间序列，支持线性加减速、丢齿与随机抖动。

use std::collections::BTreeSet;

use contracts::{CrankConfig, Polarity, SimulationConfig, WheelKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 一个记录的边沿 (64 位时间，不回绕)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEdge {
    pub time: u64,
    #[serde(default)]
    pub polarity: Polarity,
}

impl TraceEdge {
    pub fn new(time: u64, polarity: Polarity) -> Self {
        Self { time, polarity }
    }

    /// 由首个边沿时间和相邻边沿间隔构造序列
    pub fn from_intervals(start: u64, intervals: &[u64], polarity: Polarity) -> Vec<Self> {
        let mut time = start;
        let mut edges = Vec::with_capacity(intervals.len() + 1);
        edges.push(Self::new(time, polarity));
        for interval in intervals {
            time += interval;
            edges.push(Self::new(time, polarity));
        }
        edges
    }
}

/// 齿盘信号生成器
#[derive(Debug, Clone)]
pub struct WheelTrace {
    wheel: WheelKind,
    teeth_till_gap: u32,
    teeth_in_gap: u32,
    /// 附加齿位置 (ticks_per_add_tooth, ticks_per_tooth)
    add_tooth: (u32, u32),
    period: u32,
    final_period: Option<u32>,
    revolutions: u32,
    start_tooth: u32,
    start_time: u64,
    polarity: Polarity,
    dropped: BTreeSet<usize>,
    jitter: u32,
    seed: u64,
}

impl WheelTrace {
    /// 缺齿盘，例如 `gapped(58, 2)` 为 60-2
    pub fn gapped(teeth_till_gap: u32, teeth_in_gap: u32) -> Self {
        Self {
            wheel: WheelKind::Gapped,
            teeth_till_gap,
            teeth_in_gap,
            add_tooth: (0, 1),
            period: 1000,
            final_period: None,
            revolutions: 1,
            start_tooth: 1,
            start_time: 0,
            polarity: Polarity::Falling,
            dropped: BTreeSet::new(),
            jitter: 0,
            seed: 0,
        }
    }

    /// 附加齿盘：最后一齿之后 `add_ticks / tooth_ticks` 个齿距处有一个额外齿
    pub fn additional(teeth: u32, add_ticks: u32, tooth_ticks: u32) -> Self {
        Self {
            wheel: WheelKind::AdditionalTooth,
            teeth_in_gap: 0,
            add_tooth: (add_ticks, tooth_ticks.max(1)),
            ..Self::gapped(teeth, 0)
        }
    }

    /// 由配置构造
    pub fn from_config(crank: &CrankConfig, simulation: &SimulationConfig) -> Self {
        let base = match crank.wheel {
            WheelKind::Gapped => Self::gapped(crank.teeth_till_gap, crank.teeth_in_gap),
            WheelKind::AdditionalTooth => Self::additional(
                crank.teeth_till_gap,
                crank.tcr2_ticks_per_add_tooth,
                crank.tcr2_ticks_per_tooth,
            ),
        };
        let mut trace = base
            .period(simulation.period_ticks)
            .revolutions(simulation.revolutions)
            .start_tooth(simulation.start_tooth)
            .start_time(simulation.start_time)
            .polarity(crank.polarity)
            .jitter(simulation.jitter_ticks, simulation.seed);
        if let Some(final_period) = simulation.final_period_ticks {
            trace = trace.ramp_to(final_period);
        }
        for &index in &simulation.dropped_edges {
            trace = trace.drop_edge(index);
        }
        trace
    }

    pub fn period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    /// 周期从 `period` 线性变化到 `final_period`
    pub fn ramp_to(mut self, final_period: u32) -> Self {
        self.final_period = Some(final_period);
        self
    }

    pub fn revolutions(mut self, revolutions: u32) -> Self {
        self.revolutions = revolutions;
        self
    }

    /// 首个边沿对应的齿位 (1 = 缺口后第一齿)
    pub fn start_tooth(mut self, tooth: u32) -> Self {
        self.start_tooth = tooth.clamp(1, self.teeth_till_gap.max(1));
        self
    }

    pub fn start_time(mut self, time: u64) -> Self {
        self.start_time = time;
        self
    }

    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// 丢弃第 `index` 个边沿 (按生成顺序，含附加齿)
    pub fn drop_edge(mut self, index: usize) -> Self {
        self.dropped.insert(index);
        self
    }

    pub fn jitter(mut self, ticks: u32, seed: u64) -> Self {
        self.jitter = ticks;
        self.seed = seed;
        self
    }

    /// 生成边沿序列
    pub fn build(&self) -> Vec<TraceEdge> {
        let teeth = u64::from(self.teeth_till_gap) * u64::from(self.revolutions);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut edges = Vec::with_capacity(teeth as usize + self.revolutions as usize);
        let mut index = 0usize;
        let mut time = self.start_time;
        let mut tooth = self.start_tooth;

        for step in 0..teeth {
            let period = u64::from(self.period_at(step, teeth));
            self.emit(&mut edges, &mut index, &mut rng, time);

            if tooth < self.teeth_till_gap {
                time += period;
                tooth += 1;
                continue;
            }
            match self.wheel {
                WheelKind::Gapped => time += period * u64::from(self.teeth_in_gap + 1),
                WheelKind::AdditionalTooth => {
                    let (add, ticks) = self.add_tooth;
                    let extra = time + period * u64::from(add) / u64::from(ticks);
                    self.emit(&mut edges, &mut index, &mut rng, extra);
                    time += period;
                }
            }
            tooth = 1;
        }
        edges
    }

    fn emit(&self, edges: &mut Vec<TraceEdge>, index: &mut usize, rng: &mut StdRng, time: u64) {
        let offset = if self.jitter > 0 {
            let jitter = i64::from(self.jitter);
            rng.random_range(-jitter..=jitter)
        } else {
            0
        };
        if !self.dropped.contains(index) {
            let time = time.saturating_add_signed(offset);
            edges.push(TraceEdge::new(time, self.polarity));
        }
        *index += 1;
    }

    /// 第 `step` 齿的周期
    fn period_at(&self, step: u64, teeth: u64) -> u32 {
        let Some(final_period) = self.final_period else {
            return self.period;
        };
        let span = teeth.saturating_sub(1).max(1);
        let start = i64::from(self.period);
        let delta = i64::from(final_period) - start;
        let period = start + delta * step as i64 / span as i64;
        u32::try_from(period.max(1)).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(edges: &[TraceEdge]) -> Vec<u64> {
        edges.windows(2).map(|w| w[1].time - w[0].time).collect()
    }

    #[test]
    fn test_gapped_wheel_layout() {
        let edges = WheelTrace::gapped(58, 2).period(1000).revolutions(2).build();
        assert_eq!(edges.len(), 116);
        let gaps = intervals(&edges);
        assert_eq!(gaps[57], 3000);
        assert_eq!(gaps.iter().filter(|&&g| g == 3000).count(), 1);
        assert!(gaps.iter().all(|&g| g == 1000 || g == 3000));
    }

    #[test]
    fn test_start_tooth_shifts_gap() {
        let edges = WheelTrace::gapped(58, 2).start_tooth(50).revolutions(1).build();
        let gaps = intervals(&edges);
        assert_eq!(gaps[8], 3000);
    }

    #[test]
    fn test_additional_wheel_layout() {
        let edges = WheelTrace::additional(36, 512, 1024)
            .period(1000)
            .start_time(10_000)
            .revolutions(2)
            .build();
        assert_eq!(edges.len(), 74);
        assert_eq!(edges[0].time, 10_000);
        let gaps = intervals(&edges);
        assert_eq!(&gaps[34..37], &[1000, 500, 500]);
    }

    #[test]
    fn test_dropped_edges() {
        let edges = WheelTrace::gapped(58, 2).drop_edge(3).drop_edge(4).build();
        assert_eq!(edges.len(), 56);
        assert_eq!(edges[3].time - edges[2].time, 3000);
    }

    #[test]
    fn test_ramp_reaches_final_period() {
        let edges = WheelTrace::gapped(58, 2)
            .period(1000)
            .ramp_to(500)
            .revolutions(1)
            .build();
        let gaps = intervals(&edges);
        assert_eq!(gaps[0], 1000);
        assert!(gaps.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(gaps[56], 1000 - 500 * 56 / 57);
    }

    #[test]
    fn test_jitter_is_bounded_and_seeded() {
        let trace = WheelTrace::gapped(58, 2)
            .start_time(10_000)
            .revolutions(3)
            .jitter(50, 7);
        let first = trace.build();
        assert_eq!(first, trace.build());

        let clean = WheelTrace::gapped(58, 2)
            .start_time(10_000)
            .revolutions(3)
            .build();
        for (noisy, exact) in first.iter().zip(&clean) {
            assert!(noisy.time.abs_diff(exact.time) <= 50);
        }
    }

    #[test]
    fn test_from_intervals() {
        let edges = TraceEdge::from_intervals(100, &[10, 20], Polarity::Rising);
        let times: Vec<u64> = edges.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![100, 110, 130]);
        assert!(edges.iter().all(|e| e.polarity == Polarity::Rising));
    }
}
