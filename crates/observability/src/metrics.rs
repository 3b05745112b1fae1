//! Sync Engine 指标收集模块
//!
//! 基于 ChannelStatus 与引擎动作收集和统计曲轴同步的运行指标。

use std::collections::BTreeMap;

use contracts::{
    ChannelEvent, ChannelStatus, EngPosState, ErrorFlags, HostRequest, InterruptCause,
    LinkMessage,
};
use metrics::{counter, gauge, histogram};

/// 从 ChannelStatus 记录指标
///
/// 每次引擎处理完一个事件后调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_channel_status;
///
/// let actions = engine.step(event);
/// record_channel_status(&engine.status());
/// ```
pub fn record_channel_status(status: &ChannelStatus) {
    gauge!("crank_sync_eng_pos").set(eng_pos_level(status.eng_pos));
    gauge!("crank_sync_tooth_counter_cycle").set(f64::from(status.tooth_counter_cycle));
    gauge!("crank_sync_error_flags").set(f64::from(status.error.bits()));

    if status.last_tooth_period > 0 {
        gauge!("crank_sync_tooth_period_ticks").set(f64::from(status.last_tooth_period));
        histogram!("crank_sync_tooth_period_ticks_hist").record(f64::from(status.last_tooth_period));
    }

    // TRR 未知时不记录
    if !status.trr.is_unknown() {
        histogram!("crank_sync_trr_hist").record(status.trr.to_f64());
    }
}

/// 记录一次通道触发 (边沿或超时)
pub fn record_channel_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Edge(_) => counter!("crank_sync_edges_total").increment(1),
        ChannelEvent::Timeout { .. } => counter!("crank_sync_timeouts_total").increment(1),
    }
}

/// 记录主机中断
pub fn record_interrupt(cause: InterruptCause) {
    counter!("crank_sync_interrupts_total", "cause" => interrupt_label(cause)).increment(1);
}

/// 记录链接分发
pub fn record_link_dispatched(message: LinkMessage, requested: usize, delivered: usize) {
    counter!(
        "crank_sync_links_total",
        "message" => message.as_str()
    )
    .increment(delivered as u64);

    if delivered < requested {
        counter!(
            "crank_sync_links_dropped_total",
            "message" => message.as_str()
        )
        .increment((requested - delivered) as u64);
    }
}

/// 记录主机请求
pub fn record_host_request(request: &HostRequest, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "crank_sync_host_requests_total",
        "request" => request.as_str(),
        "status" => status
    )
    .increment(1);
}

/// 中断标签
pub fn interrupt_label(cause: InterruptCause) -> &'static str {
    match cause {
        InterruptCause::EngPos(eng_pos) => eng_pos.as_str(),
        InterruptCause::CycleStart => "cycle_start",
    }
}

fn eng_pos_level(eng_pos: EngPosState) -> f64 {
    match eng_pos {
        EngPosState::Seek => 0.0,
        EngPosState::FirstHalfSync => 1.0,
        EngPosState::PreFullSync => 2.0,
        EngPosState::FullSync => 3.0,
    }
}

/// 同步指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 处理的边沿数
    pub total_edges: u64,

    /// 超时次数
    pub total_timeouts: u64,

    /// 失去同步的次数 (从非 SEEK 回到 SEEK)
    pub sync_losses: u64,

    /// 完整发动机循环数
    pub cycles: u64,

    /// 首次进入 FULL_SYNC 时已处理的事件数
    pub first_full_sync_at: Option<u64>,

    /// 链接请求的目标数 / 成功投递数
    pub links_requested: u64,
    pub links_delivered: u64,

    /// 各中断原因计数
    pub interrupt_counts: BTreeMap<&'static str, u64>,

    /// 各错误标志出现次数
    pub error_counts: BTreeMap<&'static str, u64>,

    /// TRR 统计 (仅已知值)
    pub trr_stats: RunningStats,

    /// 齿周期统计 (TCR1 ticks)
    pub period_stats: RunningStats,

    last_eng_pos: EngPosState,
    last_error: ErrorFlags,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已处理的事件数
    pub fn total_events(&self) -> u64 {
        self.total_edges + self.total_timeouts
    }

    /// 记录一次触发
    pub fn record_event(&mut self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Edge(_) => self.total_edges += 1,
            ChannelEvent::Timeout { .. } => self.total_timeouts += 1,
        }
    }

    /// 记录一次中断
    pub fn record_interrupt(&mut self, cause: InterruptCause) {
        *self
            .interrupt_counts
            .entry(interrupt_label(cause))
            .or_insert(0) += 1;
        if cause == InterruptCause::CycleStart {
            self.cycles += 1;
        }
    }

    /// 记录一次链接分发
    pub fn record_link(&mut self, requested: usize, delivered: usize) {
        self.links_requested += requested as u64;
        self.links_delivered += delivered as u64;
    }

    /// 更新聚合统计，返回本次新置位的错误标志
    pub fn update(&mut self, status: &ChannelStatus) -> ErrorFlags {
        if status.eng_pos == EngPosState::Seek && self.last_eng_pos > EngPosState::Seek {
            self.sync_losses += 1;
        }
        if status.eng_pos == EngPosState::FullSync && self.first_full_sync_at.is_none() {
            self.first_full_sync_at = Some(self.total_events());
        }
        self.last_eng_pos = status.eng_pos;

        // 错误标志是累积的，只统计新置位的部分
        let raised = status.error.difference(self.last_error);
        for label in raised.labels() {
            *self.error_counts.entry(label).or_insert(0) += 1;
        }
        self.last_error = status.error;

        if !status.trr.is_unknown() {
            self.trr_stats.push(status.trr.to_f64());
        }
        if status.last_tooth_period > 0 {
            self.period_stats.push(f64::from(status.last_tooth_period));
        }
        raised
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_edges: self.total_edges,
            total_timeouts: self.total_timeouts,
            sync_losses: self.sync_losses,
            cycles: self.cycles,
            final_eng_pos: self.last_eng_pos,
            first_full_sync_at: self.first_full_sync_at,
            link_drop_rate: if self.links_requested > 0 {
                (self.links_requested - self.links_delivered) as f64
                    / self.links_requested as f64
                    * 100.0
            } else {
                0.0
            },
            trr: StatsSummary::from(&self.trr_stats),
            tooth_period: StatsSummary::from(&self.period_stats),
            interrupt_counts: self.interrupt_counts.clone(),
            error_counts: self.error_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_edges: u64,
    pub total_timeouts: u64,
    pub sync_losses: u64,
    pub cycles: u64,
    pub final_eng_pos: EngPosState,
    pub first_full_sync_at: Option<u64>,
    pub link_drop_rate: f64,
    pub trr: StatsSummary,
    pub tooth_period: StatsSummary,
    pub interrupt_counts: BTreeMap<&'static str, u64>,
    pub error_counts: BTreeMap<&'static str, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Crank Sync Summary ===")?;
        writeln!(f, "Edges: {}", self.total_edges)?;
        writeln!(f, "Timeouts: {}", self.total_timeouts)?;
        writeln!(f, "Engine position: {}", self.final_eng_pos)?;
        match self.first_full_sync_at {
            Some(events) => writeln!(f, "Full sync after: {} events", events)?,
            None => writeln!(f, "Full sync after: never")?,
        }
        writeln!(f, "Engine cycles: {}", self.cycles)?;
        writeln!(f, "Sync losses: {}", self.sync_losses)?;
        writeln!(f, "Link drop rate: {:.2}%", self.link_drop_rate)?;
        writeln!(f, "TRR: {}", self.trr)?;
        writeln!(f, "Tooth period (ticks): {}", self.tooth_period)?;

        if !self.interrupt_counts.is_empty() {
            writeln!(f, "Interrupts:")?;
            for (cause, count) in &self.interrupt_counts {
                writeln!(f, "  {}: {}", cause, count)?;
            }
        }
        if !self.error_counts.is_empty() {
            writeln!(f, "Errors:")?;
            for (flag, count) in &self.error_counts {
                writeln!(f, "  {}: {}", flag, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
