//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 示例配置可加载、可同步
//! - 模拟 e2e 测试：WheelTrace -> SimCaptureTimer -> CrankEngine -> LinkDispatcher
//! - 记录文件回放与合成信号结果一致

#[cfg(test)]
mod support {
    use contracts::{
        ChannelEvent, ChannelSet, ChannelStatus, CrankConfig, DependentConfig, DependentKind,
        EngPosState, EngineBlueprint, HostConfig, HostRequest, InterruptCause, LinkConfig,
        LinkMessage, SyncDecision,
    };
    use ingestion::{AppliedActions, SimCaptureTimer, TraceEdge};
    use observability::SyncMetricsAggregator;
    use sync_engine::{CrankEngine, CrankParams};

    pub fn blueprint(crank: CrankConfig, host: HostConfig) -> EngineBlueprint {
        EngineBlueprint {
            version: Default::default(),
            crank,
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
            host,
            simulation: None,
        }
    }

    pub fn answering_host(tcr2_adjustment: u32) -> HostConfig {
        HostConfig {
            tcr2_adjustment: Some(tcr2_adjustment),
            ..HostConfig::default()
        }
    }

    /// Everything the engine reported while replaying one trace
    #[derive(Debug, Default)]
    pub struct Replay {
        pub status: Option<ChannelStatus>,
        pub interrupts: Vec<InterruptCause>,
        pub links: Vec<(ChannelSet, LinkMessage)>,
        pub replies: u32,
        pub metrics: SyncMetricsAggregator,
        countdown: Option<u32>,
    }

    impl Replay {
        pub fn status(&self) -> &ChannelStatus {
            self.status.as_ref().expect("replay ran")
        }

        pub fn eng_pos_changes(&self) -> Vec<EngPosState> {
            self.interrupts
                .iter()
                .filter_map(|cause| match cause {
                    InterruptCause::EngPos(state) => Some(*state),
                    InterruptCause::CycleStart => None,
                })
                .collect()
        }

        pub fn link_count(&self, message: LinkMessage) -> usize {
            self.links.iter().filter(|(_, m)| *m == message).count()
        }

        fn absorb(&mut self, applied: AppliedActions, host: &HostConfig) {
            for cause in applied.interrupts {
                self.metrics.record_interrupt(cause);
                match cause {
                    InterruptCause::EngPos(EngPosState::PreFullSync) => {
                        self.countdown = host.tcr2_adjustment.map(|_| host.respond_after_teeth);
                    }
                    InterruptCause::EngPos(_) => self.countdown = None,
                    InterruptCause::CycleStart => {}
                }
                self.interrupts.push(cause);
            }
            for (targets, message) in applied.links {
                self.metrics.record_link(targets.len(), targets.len());
                self.links.push((targets, message));
            }
        }

        /// Host reply due on this tooth, if any
        fn tick(&mut self, host: &HostConfig) -> Option<HostRequest> {
            match self.countdown {
                Some(0) => {
                    self.countdown = None;
                    let tcr2_adjustment = host.tcr2_adjustment?;
                    Some(HostRequest::ConfirmSync(SyncDecision::Decoded {
                        tcr2_adjustment,
                    }))
                }
                Some(left) => {
                    self.countdown = Some(left - 1);
                    None
                }
                None => None,
            }
        }
    }

    /// Replay `edges` through the capture timer and engine until the last edge,
    /// answering the PRE_FULL_SYNC interrupt the way `blueprint.host` describes.
    pub fn replay(blueprint: &EngineBlueprint, edges: Vec<TraceEdge>) -> Replay {
        let host = &blueprint.host;
        let mut engine = CrankEngine::new(CrankParams::from_blueprint(blueprint));
        let mut timer = SimCaptureTimer::new(edges);
        let mut replay = Replay::default();

        let actions = engine
            .handle_host_request(HostRequest::Initialize)
            .expect("initialize");
        let applied = timer.apply(actions.iter()).expect("initialize actions");
        replay.absorb(applied, host);

        while timer.remaining() > 0 {
            let Some(event) = timer.next_event().expect("timer protocol") else {
                break;
            };
            replay.metrics.record_event(&event);
            let applied = timer.apply(engine.step(event).iter()).expect("step actions");
            replay.absorb(applied, host);

            if matches!(event, ChannelEvent::Edge(_)) {
                if let Some(request) = replay.tick(host) {
                    let actions = engine.handle_host_request(request).expect("confirm sync");
                    let applied = timer.apply(actions.iter()).expect("reply actions");
                    replay.absorb(applied, host);
                    replay.replies += 1;
                }
            }
            replay.metrics.update(&engine.status());
        }

        replay.status = Some(engine.status());
        replay
    }
}

#[cfg(test)]
mod sync_tests {
    use contracts::{
        ChannelId, CrankConfig, EngPosState, ErrorFlags, HostConfig, InterruptCause, LinkMessage,
        WheelKind,
    };
    use ingestion::WheelTrace;

    use crate::support::{answering_host, blueprint, replay};

    fn sixty_minus_two(revolutions: u32) -> WheelTrace {
        WheelTrace::gapped(58, 2)
            .period(1000)
            .start_time(10_000)
            .revolutions(revolutions)
    }

    #[test]
    fn test_gapped_wheel_reaches_full_sync() {
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let replay = replay(&blueprint, sixty_minus_two(6).build());

        assert_eq!(
            replay.interrupts,
            vec![
                InterruptCause::EngPos(EngPosState::FirstHalfSync),
                InterruptCause::EngPos(EngPosState::PreFullSync),
                InterruptCause::EngPos(EngPosState::FullSync),
                InterruptCause::CycleStart,
            ]
        );
        assert_eq!(replay.replies, 1);

        // half sync and the first cycle start reset the cam log
        assert_eq!(replay.link_count(LinkMessage::ResetLog), 2);
        assert_eq!(replay.link_count(LinkMessage::Reinitialize), 0);
        let cam = ChannelId::new(2).unwrap();
        assert!(replay.links.iter().all(|(targets, _)| targets.contains(cam)));

        let status = replay.status();
        assert!(status.error.is_empty());
        assert_eq!(status.tooth_counter_cycle, 118);
        assert_eq!(status.last_tooth_period_norm, 1000);
        assert!(replay.metrics.first_full_sync_at.is_some());
        assert_eq!(replay.metrics.sync_losses, 0);
    }

    #[test]
    fn test_silent_host_never_reaches_full_sync() {
        let blueprint = blueprint(CrankConfig::default(), HostConfig::default());
        let replay = replay(&blueprint, sixty_minus_two(6).build());

        let changes = replay.eng_pos_changes();
        assert!(!changes.contains(&EngPosState::FullSync));
        assert!(changes.iter().filter(|s| **s == EngPosState::PreFullSync).count() >= 2);
        assert_eq!(replay.replies, 0);
        assert!(!replay.status().error.contains(ErrorFlags::STALL));
    }

    #[test]
    fn test_jittered_wheel_keeps_sync() {
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let replay = replay(&blueprint, sixty_minus_two(8).jitter(50, 7).build());

        let status = replay.status();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(!status
            .error
            .intersects(ErrorFlags::STALL | ErrorFlags::TOOTH_IN_GAP));
        assert_eq!(replay.metrics.sync_losses, 0);
    }

    #[test]
    fn test_accelerating_wheel_keeps_sync() {
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let replay = replay(&blueprint, sixty_minus_two(8).ramp_to(600).build());

        let status = replay.status();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(!status.error.contains(ErrorFlags::STALL));
        assert!(status.last_tooth_period_norm.abs_diff(600) <= 5);
        assert!(replay.metrics.cycles >= 1);
    }

    #[test]
    fn test_two_missing_teeth_stall() {
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let replay = replay(
            &blueprint,
            sixty_minus_two(6).drop_edge(200).drop_edge(201).build(),
        );

        assert_eq!(replay.metrics.sync_losses, 1);
        assert_eq!(replay.link_count(LinkMessage::Reinitialize), 1);
        assert!(replay.status().error.contains(ErrorFlags::STALL));
        assert!(replay.eng_pos_changes().contains(&EngPosState::Seek));
    }

    #[test]
    fn test_additional_tooth_wheel_reaches_full_sync() {
        let crank = CrankConfig {
            wheel: WheelKind::AdditionalTooth,
            teeth_till_gap: 36,
            teeth_in_gap: 0,
            teeth_per_sync: 36,
            teeth_per_cycle: 72,
            tcr2_ticks_per_add_tooth: 512,
            ..CrankConfig::default()
        };
        let blueprint = blueprint(crank, answering_host(36 * 1024));
        let edges = WheelTrace::additional(36, 512, 1024)
            .period(1000)
            .start_time(10_000)
            .revolutions(4)
            .build();
        let replay = replay(&blueprint, edges);

        assert_eq!(
            &replay.eng_pos_changes()[..3],
            &[
                EngPosState::FirstHalfSync,
                EngPosState::PreFullSync,
                EngPosState::FullSync,
            ]
        );
        let status = replay.status();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(status.error.is_empty());
    }
}

#[cfg(test)]
mod trace_tests {
    use contracts::CrankConfig;
    use ingestion::{read_trace, write_trace, WheelTrace};

    use crate::support::{answering_host, blueprint, replay};

    #[test]
    fn test_recorded_trace_replays_like_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let edges = WheelTrace::gapped(58, 2)
            .start_time(10_000)
            .revolutions(5)
            .jitter(30, 11)
            .build();
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let synthetic = replay(&blueprint, edges.clone());

        for name in ["wheel.bin", "wheel.json"] {
            let path = dir.path().join(name);
            write_trace(&path, &edges).unwrap();
            let loaded = read_trace(&path).unwrap();
            assert_eq!(loaded, edges, "{name}");

            let recorded = replay(&blueprint, loaded);
            assert_eq!(recorded.interrupts, synthetic.interrupts, "{name}");
            assert_eq!(recorded.status().eng_pos, synthetic.status().eng_pos);
            assert_eq!(
                recorded.status().tooth_counter_cycle,
                synthetic.status().tooth_counter_cycle
            );
            assert_eq!(recorded.status().error, synthetic.status().error);
        }
    }
}

#[cfg(test)]
mod config_tests {
    use std::path::{Path, PathBuf};

    use config_loader::ConfigLoader;
    use contracts::{EngPosState, ErrorFlags, WheelKind};
    use ingestion::WheelTrace;

    use crate::support::replay;

    fn config_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../configs")
            .join(name)
    }

    #[test]
    fn test_engine_config_synchronizes() {
        let blueprint = ConfigLoader::load_from_path(&config_path("engine.toml")).unwrap();
        assert_eq!(blueprint.crank.revolution_teeth(), 60);
        assert_eq!(blueprint.links.dependents.len(), 3);

        let simulation = blueprint.simulation.clone().unwrap();
        let edges = WheelTrace::from_config(&blueprint.crank, &simulation).build();
        let replay = replay(&blueprint, edges);

        let status = replay.status();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(!status.error.contains(ErrorFlags::STALL));
        assert_eq!(replay.replies, 1);
        assert!(replay.metrics.cycles >= 1);
        // tooth period logging is on
        assert!(status.tooth_period_log.iter().any(|&period| period > 0));
    }

    #[test]
    fn test_additional_tooth_config_synchronizes() {
        let blueprint =
            ConfigLoader::load_from_path(&config_path("additional_tooth.toml")).unwrap();
        assert_eq!(blueprint.crank.wheel, WheelKind::AdditionalTooth);

        let simulation = blueprint.simulation.clone().unwrap();
        let edges = WheelTrace::from_config(&blueprint.crank, &simulation).build();
        let replay = replay(&blueprint, edges);

        let status = replay.status();
        assert_eq!(status.eng_pos, EngPosState::FullSync);
        assert!(status.error.is_empty());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::{CrankConfig, EngPosState, HostRequest, SyncDecision};
    use dispatcher::DispatcherBuilder;
    use ingestion::{SimCaptureTimer, WheelTrace};
    use sync_engine::{CrankEngine, CrankParams};

    use crate::support::{answering_host, blueprint};

    /// End-to-end test: WheelTrace -> SimCaptureTimer -> CrankEngine -> LinkDispatcher
    ///
    /// 验证完整的数据流：
    /// 1. 捕获定时器按窗口回放边沿
    /// 2. 引擎同步并在失步时发出链接动作
    /// 3. Dispatcher 将动作分发到凸轮日志与从属通道，关闭时排空队列
    #[tokio::test]
    async fn test_e2e_stall_reinitializes_dependents() {
        let blueprint = blueprint(CrankConfig::default(), answering_host(0));
        let edges = WheelTrace::gapped(58, 2)
            .start_time(10_000)
            .revolutions(6)
            .drop_edge(200)
            .drop_edge(201)
            .build();

        let mut engine = CrankEngine::new(CrankParams::from_blueprint(&blueprint));
        let (dispatcher, collaborators) =
            DispatcherBuilder::new(blueprint.links.clone(), engine.view())
                .build()
                .unwrap();

        let mut timer = SimCaptureTimer::new(edges);
        let actions = engine.handle_host_request(HostRequest::Initialize).unwrap();
        timer.apply(actions.iter()).unwrap();

        let mut full_sync = false;
        let mut delivered = 0;
        while timer.remaining() > 0 {
            let Some(event) = timer.next_event().unwrap() else {
                break;
            };
            let mut applied = timer.apply(engine.step(event).iter()).unwrap();
            if engine.eng_pos() == EngPosState::PreFullSync {
                let reply = HostRequest::ConfirmSync(SyncDecision::Decoded { tcr2_adjustment: 0 });
                let actions = engine.handle_host_request(reply).unwrap();
                let extra = timer.apply(actions.iter()).unwrap();
                applied.links.extend(extra.links);
            }
            full_sync |= engine.eng_pos() == EngPosState::FullSync;

            for (targets, message) in applied.links {
                delivered += dispatcher.notify(targets, message);
            }
            tokio::task::yield_now().await;
        }

        let metrics = tokio::time::timeout(Duration::from_secs(5), dispatcher.shutdown())
            .await
            .expect("dispatcher drained");
        let total: u64 = metrics.iter().map(|(_, m)| m.delivered_count).sum();
        assert_eq!(total, delivered as u64);

        assert!(full_sync);
        assert_eq!(collaborators.dependents.len(), 2);
        for (name, status) in &collaborators.dependents {
            assert_eq!(status.reinitializations(), 1, "{name}");
        }
        let cam_log = collaborators.cam_log.unwrap();
        assert!(cam_log.reset_count() >= 1);
    }
}
