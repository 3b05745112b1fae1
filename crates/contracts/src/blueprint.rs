//! EngineBlueprint - Config Loader 输出
//!
//! 描述完整的曲轴同步配置：齿盘几何、窗口比例、链接目标、主机应答脚本与仿真参数。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ChannelId, ChannelSet, Polarity};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的引擎配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 曲轴通道配置
    #[validate(nested)]
    pub crank: CrankConfig,

    /// 跨通道链接配置
    #[serde(default)]
    #[validate(nested)]
    pub links: LinkConfig,

    /// 主机应答脚本 (仿真用)
    #[serde(default)]
    pub host: HostConfig,

    /// 合成齿信号参数 (可选)
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

/// 齿盘类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelKind {
    /// 缺齿盘 (e.g. 60-2)
    #[default]
    Gapped,
    /// 附加齿盘 (两齿之间插入一个额外齿)
    AdditionalTooth,
}

/// 曲轴通道配置
///
/// 比例字段为小数 (0.25 = 25%)，加载后由引擎转换为定点数。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrankConfig {
    /// 通道号
    #[serde(default)]
    #[validate(range(max = 31))]
    pub channel: u8,

    /// 齿盘类型
    #[serde(default)]
    pub wheel: WheelKind,

    /// 缺口之间的实齿数
    #[serde(default = "default_teeth_till_gap")]
    #[validate(range(min = 3, max = 255))]
    pub teeth_till_gap: u32,

    /// 缺口内缺失的齿数 (附加齿盘为 0)
    #[serde(default = "default_teeth_in_gap")]
    #[validate(range(max = 8))]
    pub teeth_in_gap: u32,

    /// 每个发动机循环 (720°) 的齿位数，含缺齿
    #[serde(default = "default_teeth_per_cycle")]
    #[validate(range(min = 1, max = 1024))]
    pub teeth_per_cycle: u32,

    /// 同步段齿位数，段结束时请求主机解码凸轮日志
    #[serde(default = "default_teeth_per_sync")]
    #[validate(range(min = 1, max = 1024))]
    pub teeth_per_sync: u32,

    /// 消隐时间结束后忽略的齿数
    #[serde(default)]
    pub blank_teeth: u32,

    /// 首个边沿之后的消隐时间 (TCR1 ticks)
    #[serde(default)]
    pub blank_time: u32,

    /// 等待第二个边沿的超时 (TCR1 ticks)
    #[serde(default = "default_first_tooth_timeout")]
    #[validate(range(min = 1, max = 0x00FF_FFFF))]
    pub first_tooth_timeout: u32,

    /// 每齿角度 (TCR2 ticks)
    #[serde(default = "default_tcr2_ticks_per_tooth")]
    #[validate(range(min = 1, max = 0xFFFF))]
    pub tcr2_ticks_per_tooth: u32,

    /// 附加齿与前一实齿之间的角度 (TCR2 ticks)
    #[serde(default)]
    pub tcr2_ticks_per_add_tooth: u32,

    /// 正常窗口半宽比例
    #[serde(default = "default_win_ratio_normal")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub win_ratio_normal: f64,

    /// 跨缺口窗口的后沿比例
    #[serde(default = "default_win_ratio_across_gap")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub win_ratio_across_gap: f64,

    /// 缺口后首齿窗口比例
    #[serde(default = "default_win_ratio_after_gap")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub win_ratio_after_gap: f64,

    /// 超时补齿后窗口比例
    #[serde(default = "default_win_ratio_after_timeout")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub win_ratio_after_timeout: f64,

    /// ABA 判据比例：gap_ratio * 当前周期 > 前一周期 判定为缺口
    #[serde(default = "default_gap_ratio")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub gap_ratio: f64,

    /// 捕获边沿极性
    #[serde(default)]
    pub polarity: Polarity,

    /// 是否记录每齿周期
    #[serde(default)]
    pub log_tooth_periods: bool,

    /// TCR1 以全时钟运行 (速度估计减半)
    #[serde(default)]
    pub tcr1_full_clock: bool,

    /// 角度硬件高速模式勘误规避
    #[serde(default)]
    pub angle_errata_workaround: bool,
}

fn default_teeth_till_gap() -> u32 {
    58
}

fn default_teeth_in_gap() -> u32 {
    2
}

fn default_teeth_per_cycle() -> u32 {
    120
}

fn default_teeth_per_sync() -> u32 {
    60
}

fn default_first_tooth_timeout() -> u32 {
    1_000_000
}

fn default_tcr2_ticks_per_tooth() -> u32 {
    1024
}

fn default_win_ratio_normal() -> f64 {
    0.25
}

fn default_win_ratio_across_gap() -> f64 {
    0.5
}

fn default_win_ratio_after_gap() -> f64 {
    0.5
}

fn default_win_ratio_after_timeout() -> f64 {
    0.5
}

fn default_gap_ratio() -> f64 {
    0.667
}

impl Default for CrankConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            wheel: WheelKind::Gapped,
            teeth_till_gap: default_teeth_till_gap(),
            teeth_in_gap: default_teeth_in_gap(),
            teeth_per_cycle: default_teeth_per_cycle(),
            teeth_per_sync: default_teeth_per_sync(),
            blank_teeth: 0,
            blank_time: 0,
            first_tooth_timeout: default_first_tooth_timeout(),
            tcr2_ticks_per_tooth: default_tcr2_ticks_per_tooth(),
            tcr2_ticks_per_add_tooth: 0,
            win_ratio_normal: default_win_ratio_normal(),
            win_ratio_across_gap: default_win_ratio_across_gap(),
            win_ratio_after_gap: default_win_ratio_after_gap(),
            win_ratio_after_timeout: default_win_ratio_after_timeout(),
            gap_ratio: default_gap_ratio(),
            polarity: Polarity::Falling,
            log_tooth_periods: false,
            tcr1_full_clock: false,
            angle_errata_workaround: false,
        }
    }
}

impl CrankConfig {
    /// 一圈的齿位数 (实齿 + 缺齿)
    pub fn revolution_teeth(&self) -> u32 {
        self.teeth_till_gap + self.teeth_in_gap
    }

    /// 一圈的角度
    pub fn ticks_per_revolution(&self) -> u64 {
        u64::from(self.revolution_teeth()) * u64::from(self.tcr2_ticks_per_tooth)
    }

    /// 一个发动机循环的角度
    pub fn ticks_per_cycle(&self) -> u64 {
        u64::from(self.teeth_per_cycle) * u64::from(self.tcr2_ticks_per_tooth)
    }
}

/// 跨通道链接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinkConfig {
    /// 凸轮日志通道
    #[serde(default)]
    #[validate(range(max = 31))]
    pub cam_channel: Option<u8>,

    /// 失步时需要重新初始化的从属通道 (最多 4 个)
    #[serde(default)]
    #[validate(length(max = 4))]
    pub dependents: Vec<DependentConfig>,

    /// 每个目标的队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 凸轮日志容量
    #[serde(default = "default_cam_log_capacity")]
    #[validate(range(min = 1))]
    pub cam_log_capacity: usize,
}

fn default_queue_capacity() -> usize {
    16
}

fn default_cam_log_capacity() -> usize {
    64
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            cam_channel: None,
            dependents: Vec::new(),
            queue_capacity: default_queue_capacity(),
            cam_log_capacity: default_cam_log_capacity(),
        }
    }
}

impl LinkConfig {
    /// 凸轮日志链接目标
    pub fn cam_targets(&self) -> ChannelSet {
        self.cam_channel.and_then(ChannelId::new).into_iter().collect()
    }

    /// 失步通知目标
    pub fn dependent_targets(&self) -> ChannelSet {
        self.dependents
            .iter()
            .filter_map(|dependent| ChannelId::new(dependent.channel))
            .collect()
    }
}

/// 从属通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentConfig {
    /// 名称
    pub name: String,

    /// 通道号
    pub channel: u8,

    /// 通道类型
    #[serde(default)]
    pub kind: DependentKind,
}

/// 从属通道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentKind {
    Fuel,
    Spark,
    Injection,
    Knock,
    /// 仅记录日志
    #[default]
    Log,
}

/// 主机应答脚本
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// 解码得到的角度修正；None 表示主机从不应答
    #[serde(default)]
    pub tcr2_adjustment: Option<u32>,

    /// 进入 PRE_FULL_SYNC 后经过多少齿再应答
    #[serde(default)]
    pub respond_after_teeth: u32,

    /// 在给出解码结果前先回复"无法解码"的次数
    #[serde(default)]
    pub undecided_replies: u32,
}

/// 合成齿信号参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 稳态齿周期 (TCR1 ticks)
    #[serde(default = "default_period_ticks")]
    pub period_ticks: u32,

    /// 齿盘转数
    #[serde(default = "default_revolutions")]
    pub revolutions: u32,

    /// 首个边沿对应的齿位 (1 = 缺口后第一齿)
    #[serde(default = "default_start_tooth")]
    pub start_tooth: u32,

    /// 首个边沿时间
    #[serde(default)]
    pub start_time: u64,

    /// 最后一转结束时的齿周期 (线性加减速)
    #[serde(default)]
    pub final_period_ticks: Option<u32>,

    /// 需要丢弃的边沿序号
    #[serde(default)]
    pub dropped_edges: Vec<usize>,

    /// 随机抖动幅度 (TCR1 ticks)
    #[serde(default)]
    pub jitter_ticks: u32,

    /// 抖动随机种子
    #[serde(default)]
    pub seed: u64,
}

fn default_period_ticks() -> u32 {
    1000
}

fn default_revolutions() -> u32 {
    4
}

fn default_start_tooth() -> u32 {
    1
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period_ticks: default_period_ticks(),
            revolutions: default_revolutions(),
            start_tooth: default_start_tooth(),
            start_time: 0,
            final_period_ticks: None,
            dropped_edges: Vec::new(),
            jitter_ticks: 0,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> EngineBlueprint {
        EngineBlueprint {
            version: ConfigVersion::V1,
            crank: CrankConfig::default(),
            links: LinkConfig {
                cam_channel: Some(2),
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
            },
            host: HostConfig::default(),
            simulation: None,
        }
    }

    #[test]
    fn test_default_crank_geometry() {
        let crank = CrankConfig::default();
        assert_eq!(crank.revolution_teeth(), 60);
        assert_eq!(crank.ticks_per_revolution(), 60 * 1024);
        assert_eq!(crank.ticks_per_cycle(), 120 * 1024);
    }

    #[test]
    fn test_link_targets() {
        let bp = sample_blueprint();
        assert_eq!(bp.links.cam_targets().len(), 1);
        let dependents: Vec<u8> = bp
            .links
            .dependent_targets()
            .iter()
            .map(|c| c.index())
            .collect();
        assert_eq!(dependents, vec![5, 6]);
    }

    #[test]
    fn test_field_validation() {
        let mut bp = sample_blueprint();
        assert!(bp.validate().is_ok());

        bp.crank.win_ratio_normal = 1.0;
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_wheel_kind() {
        let mut bp = sample_blueprint();
        bp.crank.wheel = WheelKind::AdditionalTooth;
        let json = serde_json::to_string(&bp).unwrap();
        assert!(json.contains("additional_tooth"));
        let back: EngineBlueprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.crank.wheel, WheelKind::AdditionalTooth);
    }
}
