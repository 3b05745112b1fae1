//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化，日志级别由 CLI 的 `-q` / `-v` 推导，`RUST_LOG` 优先
//! - Prometheus 导出器，附带曲轴同步指标说明
//! - 曲轴同步指标收集与统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::from_verbosity(LogFormat::Compact, false, 1))?;
//!
//! let actions = engine.step(event);
//! observability::record_channel_event(&event);
//! observability::record_channel_status(&engine.status());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

// Re-exports
pub use crate::metrics::{
    interrupt_label, record_channel_event, record_channel_status, record_host_request,
    record_interrupt, record_link_dispatched, MetricsSummary, RunningStats, StatsSummary,
    SyncMetricsAggregator,
};

/// 日志与指标配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// `RUST_LOG` 未设置时使用的过滤器
    pub default_filter: String,
    /// Prometheus 端口 (None = 不安装导出器)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from_verbosity(LogFormat::default(), false, 0)
    }
}

impl ObservabilityConfig {
    /// `quiet` 压过 `verbose`；`-v` 打开引擎状态切换日志，`-vv` 打开逐步 span。
    pub fn from_verbosity(log_format: LogFormat, quiet: bool, verbose: u8) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            default_filter: level.to_string(),
            metrics_port: None,
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志，带当前 span (引擎状态、时间戳)
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    #[default]
    Compact,
}

/// 按格式构建 fmt 层
fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 安装全局 subscriber，并在配置了端口时启动 Prometheus 导出器
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.log_format))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// 安装 Prometheus 导出器 (tracing 已初始化时单独调用)
pub fn install_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;
    describe_metrics();

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

/// 为引擎发出的主要序列登记说明
fn describe_metrics() {
    use ::metrics::{describe_counter, describe_gauge, Unit};

    describe_counter!(
        "crank_sync_errors_total",
        Unit::Count,
        "Error flag occurrences by flag, counted every time a flag is raised"
    );
    describe_counter!(
        "crank_sync_eng_pos_transitions_total",
        Unit::Count,
        "Engine position changes by target state"
    );
    describe_counter!(
        "crank_sync_stalls_total",
        Unit::Count,
        "Synchronization losses from a synced position"
    );
    describe_counter!(
        "crank_sync_cycles_total",
        Unit::Count,
        "Completed engine cycles in full sync"
    );
    describe_gauge!(
        "crank_sync_trr",
        "Tooth rate estimate in TCR1 ticks per angle tick"
    );
    describe_gauge!(
        "crank_sync_eng_pos",
        "Engine position: 0 seek, 1 first half, 2 pre full, 3 full sync"
    );
}
