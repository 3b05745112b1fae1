//! Engine parameters derived from the configuration blueprint.

use contracts::{
    ChannelId, ChannelSet, CrankConfig, EngineBlueprint, Fract24, LinkConfig, Polarity, WheelKind,
};

use crate::gap::AbaTest;
use crate::window::WindowScheduler;

/// Crank channel parameters in the engine's fixed-point form.
#[derive(Debug, Clone)]
pub struct CrankParams {
    pub channel: ChannelId,
    pub wheel: WheelKind,
    pub teeth_till_gap: u32,
    pub teeth_in_gap: u32,
    pub teeth_per_cycle: u32,
    pub teeth_per_sync: u32,
    pub blank_teeth: u32,
    pub blank_time: u32,
    pub first_tooth_timeout: u32,
    pub ticks_per_tooth: u32,
    pub ticks_per_add_tooth: u32,
    pub win_ratio_normal: Fract24,
    pub win_ratio_across_gap: Fract24,
    pub win_ratio_after_gap: Fract24,
    pub win_ratio_after_timeout: Fract24,
    pub gap_ratio: Fract24,
    pub polarity: Polarity,
    pub log_tooth_periods: bool,
    pub tcr1_full_clock: bool,
    pub angle_errata_workaround: bool,
    /// Link targets reset on every confirmed gap and cycle
    pub cam_targets: ChannelSet,
    /// Link targets re-initialized on stall
    pub dependent_targets: ChannelSet,
}

impl CrankParams {
    pub fn from_blueprint(blueprint: &EngineBlueprint) -> Self {
        Self::from_config(&blueprint.crank, &blueprint.links)
    }

    pub fn from_config(crank: &CrankConfig, links: &LinkConfig) -> Self {
        Self {
            channel: ChannelId::new(crank.channel).unwrap_or_default(),
            wheel: crank.wheel,
            teeth_till_gap: crank.teeth_till_gap,
            teeth_in_gap: match crank.wheel {
                WheelKind::Gapped => crank.teeth_in_gap,
                WheelKind::AdditionalTooth => 0,
            },
            teeth_per_cycle: crank.teeth_per_cycle.max(1),
            teeth_per_sync: crank.teeth_per_sync.max(1),
            blank_teeth: crank.blank_teeth,
            blank_time: crank.blank_time,
            first_tooth_timeout: crank.first_tooth_timeout,
            ticks_per_tooth: crank.tcr2_ticks_per_tooth.max(1),
            ticks_per_add_tooth: crank.tcr2_ticks_per_add_tooth,
            win_ratio_normal: Fract24::from_f64(crank.win_ratio_normal),
            win_ratio_across_gap: Fract24::from_f64(crank.win_ratio_across_gap),
            win_ratio_after_gap: Fract24::from_f64(crank.win_ratio_after_gap),
            win_ratio_after_timeout: Fract24::from_f64(crank.win_ratio_after_timeout),
            gap_ratio: Fract24::from_f64(crank.gap_ratio),
            polarity: crank.polarity,
            log_tooth_periods: crank.log_tooth_periods,
            tcr1_full_clock: crank.tcr1_full_clock,
            angle_errata_workaround: crank.angle_errata_workaround,
            cam_targets: links.cam_targets(),
            dependent_targets: links.dependent_targets(),
        }
    }

    pub fn windows(&self) -> WindowScheduler {
        WindowScheduler {
            ratio_normal: self.win_ratio_normal,
            ratio_across_gap: self.win_ratio_across_gap,
            ratio_after_gap: self.win_ratio_after_gap,
            ratio_after_timeout: self.win_ratio_after_timeout,
            teeth_in_gap: self.teeth_in_gap,
        }
    }

    pub(crate) fn aba(&self) -> AbaTest {
        AbaTest::new(self.gap_ratio)
    }

    /// Angle covered by the gap plus the tooth that ends it.
    pub fn gap_angle(&self) -> u32 {
        (self.teeth_in_gap + 1) * self.ticks_per_tooth
    }

    pub fn ticks_per_revolution(&self) -> u32 {
        (self.teeth_till_gap + self.teeth_in_gap) * self.ticks_per_tooth
    }

    pub fn ticks_per_cycle(&self) -> u32 {
        self.teeth_per_cycle * self.ticks_per_tooth
    }
}

impl Default for CrankParams {
    fn default() -> Self {
        Self::from_config(&CrankConfig::default(), &LinkConfig::default())
    }
}
