//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator 派生规则)
//! - 齿盘几何：缺齿盘至少缺一齿，附加齿盘附加齿角度合法
//! - 同步段 / 循环齿位数为整圈倍数，循环角度不超过 24 位
//! - 链接通道唯一，且不与曲轴通道冲突
//! - 主机应答与仿真参数合理

use std::collections::HashSet;

use contracts::{
    ContractError, CrankConfig, EngineBlueprint, HostConfig, LinkConfig, SimulationConfig,
    WheelKind, ANGLE_MASK,
};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 EngineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &EngineBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_wheel(&blueprint.crank)?;
    validate_segments(&blueprint.crank)?;
    validate_links(&blueprint.crank, &blueprint.links)?;
    validate_host(&blueprint.crank, &blueprint.host)?;
    if let Some(simulation) = &blueprint.simulation {
        validate_simulation(&blueprint.crank, simulation)?;
    }
    Ok(())
}

/// 字段级范围校验
fn validate_fields(blueprint: &EngineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = first_field_path(&errors).unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 取第一个出错字段的路径，例如 `crank.gap_ratio`
fn first_field_path(errors: &ValidationErrors) -> Option<String> {
    let (field, kind) = errors.errors().iter().next()?;
    match kind {
        ValidationErrorsKind::Field(_) => Some(field.to_string()),
        ValidationErrorsKind::Struct(inner) => Some(match first_field_path(inner) {
            Some(rest) => format!("{field}.{rest}"),
            None => field.to_string(),
        }),
        ValidationErrorsKind::List(items) => {
            let (index, inner) = items.iter().next()?;
            Some(match first_field_path(inner) {
                Some(rest) => format!("{field}[{index}].{rest}"),
                None => format!("{field}[{index}]"),
            })
        }
    }
}

/// 校验齿盘几何
fn validate_wheel(crank: &CrankConfig) -> Result<(), ContractError> {
    match crank.wheel {
        WheelKind::Gapped => {
            if crank.teeth_in_gap == 0 {
                return Err(ContractError::config_validation(
                    "crank.teeth_in_gap",
                    "gapped wheel needs at least one missing tooth",
                ));
            }
        }
        WheelKind::AdditionalTooth => {
            if crank.teeth_in_gap != 0 {
                return Err(ContractError::config_validation(
                    "crank.teeth_in_gap",
                    format!(
                        "additional tooth wheel has no gap, got teeth_in_gap = {}",
                        crank.teeth_in_gap
                    ),
                ));
            }
            let add = crank.tcr2_ticks_per_add_tooth;
            let ticks = crank.tcr2_ticks_per_tooth;
            if add == 0 || add >= ticks {
                return Err(ContractError::config_validation(
                    "crank.tcr2_ticks_per_add_tooth",
                    format!("must be within (0, {ticks}), got {add}"),
                ));
            }
            // 附加齿两侧的短周期都必须通过 ABA 判据
            let fraction = f64::from(add) / f64::from(ticks);
            if fraction >= crank.gap_ratio || fraction <= 1.0 - crank.gap_ratio {
                return Err(ContractError::config_validation(
                    "crank.tcr2_ticks_per_add_tooth",
                    format!(
                        "additional tooth at {fraction:.3} of the pitch is not detectable with gap_ratio {}",
                        crank.gap_ratio
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// 校验同步段与循环长度
fn validate_segments(crank: &CrankConfig) -> Result<(), ContractError> {
    let revolution = crank.revolution_teeth();
    if crank.teeth_per_sync % revolution != 0 {
        return Err(ContractError::config_validation(
            "crank.teeth_per_sync",
            format!(
                "teeth_per_sync ({}) must be a multiple of the {revolution} teeth per revolution",
                crank.teeth_per_sync
            ),
        ));
    }
    if crank.teeth_per_cycle % revolution != 0 {
        return Err(ContractError::config_validation(
            "crank.teeth_per_cycle",
            format!(
                "teeth_per_cycle ({}) must be a multiple of the {revolution} teeth per revolution",
                crank.teeth_per_cycle
            ),
        ));
    }
    if crank.teeth_per_sync > crank.teeth_per_cycle {
        return Err(ContractError::config_validation(
            "crank.teeth_per_sync / crank.teeth_per_cycle",
            format!(
                "teeth_per_sync ({}) must be <= teeth_per_cycle ({})",
                crank.teeth_per_sync, crank.teeth_per_cycle
            ),
        ));
    }
    if crank.ticks_per_cycle() > u64::from(ANGLE_MASK) {
        return Err(ContractError::config_validation(
            "crank.tcr2_ticks_per_tooth",
            format!(
                "cycle angle {} exceeds the 24-bit angle counter",
                crank.ticks_per_cycle()
            ),
        ));
    }
    Ok(())
}

/// 校验链接通道
fn validate_links(crank: &CrankConfig, links: &LinkConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::from([crank.channel]);

    if let Some(cam) = links.cam_channel {
        if !seen.insert(cam) {
            return Err(ContractError::config_validation(
                "links.cam_channel",
                format!("channel {cam} is already used by the crank"),
            ));
        }
    }

    for (idx, dependent) in links.dependents.iter().enumerate() {
        if dependent.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("links.dependents[{idx}].name"),
                "dependent name cannot be empty",
            ));
        }
        if dependent.channel > 31 {
            return Err(ContractError::config_validation(
                format!("links.dependents[{idx}].channel"),
                format!("channel must be < 32, got {}", dependent.channel),
            ));
        }
        if !seen.insert(dependent.channel) {
            return Err(ContractError::config_validation(
                format!("links.dependents[{idx}].channel"),
                format!("duplicate channel {}", dependent.channel),
            ));
        }
    }
    Ok(())
}

/// 校验主机应答脚本
fn validate_host(crank: &CrankConfig, host: &HostConfig) -> Result<(), ContractError> {
    if host.respond_after_teeth >= crank.teeth_per_sync {
        return Err(ContractError::config_validation(
            "host.respond_after_teeth",
            format!(
                "reply after {} teeth misses the {}-tooth sync segment",
                host.respond_after_teeth, crank.teeth_per_sync
            ),
        ));
    }
    if let Some(adjustment) = host.tcr2_adjustment {
        let revolution = crank.ticks_per_revolution();
        if adjustment > ANGLE_MASK || u64::from(adjustment) % revolution != 0 {
            return Err(ContractError::config_validation(
                "host.tcr2_adjustment",
                format!("{adjustment} is not a whole number of revolutions ({revolution} ticks)"),
            ));
        }
    }
    Ok(())
}

/// 校验仿真参数
fn validate_simulation(
    crank: &CrankConfig,
    simulation: &SimulationConfig,
) -> Result<(), ContractError> {
    if simulation.period_ticks == 0 {
        return Err(ContractError::config_validation(
            "simulation.period_ticks",
            "period_ticks must be > 0",
        ));
    }
    if simulation.final_period_ticks == Some(0) {
        return Err(ContractError::config_validation(
            "simulation.final_period_ticks",
            "final_period_ticks must be > 0",
        ));
    }
    if simulation.revolutions == 0 {
        return Err(ContractError::config_validation(
            "simulation.revolutions",
            "revolutions must be > 0",
        ));
    }
    if simulation.start_tooth == 0 || simulation.start_tooth > crank.teeth_till_gap {
        return Err(ContractError::config_validation(
            "simulation.start_tooth",
            format!(
                "start_tooth must be within 1..={}, got {}",
                crank.teeth_till_gap, simulation.start_tooth
            ),
        ));
    }
    // 两个相邻边沿各自抖动，周期偏差最多为两倍抖动
    let slack = crank.win_ratio_normal * f64::from(simulation.period_ticks);
    if f64::from(simulation.jitter_ticks) * 2.0 >= slack {
        return Err(ContractError::config_validation(
            "simulation.jitter_ticks",
            format!(
                "jitter of {} ticks would push teeth outside the normal window",
                simulation.jitter_ticks
            ),
        ));
    }
    Ok(())
}
