//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{EngineBlueprint, Trr, WheelKind, Window, TRR_FRACTION_BITS};
use serde::Serialize;
use sync_engine::{angle_to_time, time_to_angle_hr, time_to_angle_lr, CrankParams};
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Wheel geometry for JSON output
#[derive(Debug, Serialize)]
struct WheelInfo {
    wheel: WheelKind,
    teeth_till_gap: u32,
    teeth_in_gap: u32,
    revolution_teeth: u32,
    teeth_per_cycle: u32,
    teeth_per_sync: u32,
    ticks_per_tooth: u32,
    ticks_per_revolution: u32,
    ticks_per_cycle: u32,
    degrees_per_tooth: f64,
    windows: WindowInfo,
    rate: RateInfo,
    links: LinkInfo,
}

/// Window bounds relative to the last edge at the reference period
#[derive(Debug, Serialize)]
struct WindowInfo {
    period: u32,
    normal: (u32, u32),
    across_gap: (u32, u32),
    after_timeout: (u32, u32),
    /// Shortest interval still taken as the gap
    gap_threshold: u32,
}

/// Angle conversions at the reference period
#[derive(Debug, Serialize)]
struct RateInfo {
    trr: u32,
    /// One tooth period converted at high resolution
    tooth_angle_hr: u32,
    /// The same at low (look-ahead) resolution
    tooth_angle_lr: u32,
    /// TCR1 ticks per revolution
    revolution_time: u32,
}

#[derive(Debug, Serialize)]
struct LinkInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    cam_channel: Option<u8>,
    dependents: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");
    let blueprint = load_blueprint(&args.config)?;
    let wheel = build_wheel_info(&blueprint, args.period);

    if args.json {
        let json =
            serde_json::to_string_pretty(&wheel).context("Failed to serialize wheel info")?;
        println!("{}", json);
    } else {
        print_wheel_info(&wheel);
    }

    Ok(())
}

fn build_wheel_info(blueprint: &EngineBlueprint, period: u32) -> WheelInfo {
    let params = CrankParams::from_blueprint(blueprint);
    let windows = params.windows();
    let span = |window: Window| (window.opens_at, window.closes_at.unwrap_or(u32::MAX));

    // an interval is a gap once the previous period is below gap_ratio of it
    let gap_ratio = params.gap_ratio.to_f64();
    let gap_threshold = if gap_ratio > 0.0 {
        (f64::from(period) / gap_ratio).floor() as u32 + 1
    } else {
        u32::MAX
    };

    // estimate the engine settles on at this period
    let raw = (u64::from(period) << TRR_FRACTION_BITS) / u64::from(params.ticks_per_tooth.max(1));
    let trr = Trr::from_raw(u32::try_from(raw).unwrap_or(Trr::MAX_RAW));

    WheelInfo {
        wheel: params.wheel,
        teeth_till_gap: params.teeth_till_gap,
        teeth_in_gap: params.teeth_in_gap,
        revolution_teeth: params.teeth_till_gap + params.teeth_in_gap,
        teeth_per_cycle: params.teeth_per_cycle,
        teeth_per_sync: params.teeth_per_sync,
        ticks_per_tooth: params.ticks_per_tooth,
        ticks_per_revolution: params.ticks_per_revolution(),
        ticks_per_cycle: params.ticks_per_cycle(),
        degrees_per_tooth: 720.0 / f64::from(params.teeth_per_cycle),
        windows: WindowInfo {
            period,
            normal: span(windows.open_normal(0, params.win_ratio_normal, period)),
            across_gap: span(windows.open_across_gap(0, period)),
            after_timeout: span(windows.close_using_ratio(
                0,
                params.win_ratio_after_timeout,
                period,
            )),
            gap_threshold,
        },
        rate: RateInfo {
            trr: trr.raw(),
            tooth_angle_hr: time_to_angle_hr(period, trr),
            tooth_angle_lr: time_to_angle_lr(period, trr),
            revolution_time: angle_to_time(params.ticks_per_revolution(), trr),
        },
        links: LinkInfo {
            cam_channel: blueprint.links.cam_channel,
            dependents: blueprint
                .links
                .dependents
                .iter()
                .map(|d| format!("{} ({:?}, channel {})", d.name, d.kind, d.channel))
                .collect(),
        },
    }
}

fn print_wheel_info(wheel: &WheelInfo) {
    println!("=== Crank Wheel ===");
    println!("Wheel: {:?}", wheel.wheel);
    println!(
        "Teeth: {} + {} missing ({} positions per revolution)",
        wheel.teeth_till_gap, wheel.teeth_in_gap, wheel.revolution_teeth
    );
    println!(
        "Cycle: {} teeth ({:.2} deg/tooth), sync segment {} teeth",
        wheel.teeth_per_cycle, wheel.degrees_per_tooth, wheel.teeth_per_sync
    );
    println!(
        "Angle: {} ticks/tooth, {} ticks/revolution, {} ticks/cycle",
        wheel.ticks_per_tooth, wheel.ticks_per_revolution, wheel.ticks_per_cycle
    );

    let w = &wheel.windows;
    println!("\n=== Windows at period {} ===", w.period);
    println!("Normal:        [{}, {}]", w.normal.0, w.normal.1);
    println!("Across gap:    [{}, {}]", w.across_gap.0, w.across_gap.1);
    println!("After timeout: [{}, {}]", w.after_timeout.0, w.after_timeout.1);
    println!("Gap threshold: {}", w.gap_threshold);

    let r = &wheel.rate;
    println!("\n=== Rate ===");
    println!("TRR: {}", r.trr);
    println!(
        "Tooth angle: {} ticks (low resolution {})",
        r.tooth_angle_hr, r.tooth_angle_lr
    );
    println!("Revolution time: {}", r.revolution_time);

    println!("\n=== Links ===");
    match wheel.links.cam_channel {
        Some(channel) => println!("Cam log: channel {}", channel),
        None => println!("Cam log: none"),
    }
    for dependent in &wheel.links.dependents {
        println!("Dependent: {}", dependent);
    }
    println!();
}
