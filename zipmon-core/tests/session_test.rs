// Integration tests for the interactive debug session
mod utils;

#[cfg(test)]
mod tests {
    use super::utils::{fast_config, sim_with_noops, ScriptedConsole, BASE};
    use std::time::Duration;
    use zipmon_core::bus::{DebugPort, DevBus};
    use zipmon_core::debugger::{
        Flow, PipelineStage, RegisterFault, Screen, Session, SessionConfig, SessionState,
        StageFetch, View,
    };
    use zipmon_core::error::BusError;
    use zipmon_core::regs::{ctrl, CpuControl, Mode, Peripheral, RegisterId};
    use zipmon_core::ZipDecoder;

    fn halted_snapshot<B: DevBus>(
        session: &mut Session<B, ZipDecoder>,
    ) -> Box<zipmon_core::debugger::RegisterSnapshot> {
        match session.refresh().unwrap() {
            Some(View::Halted(snapshot)) => snapshot,
            other => panic!("expected a halted view, got {other:?}"),
        }
    }

    #[test]
    fn test_go_releases_cpu_without_reset_or_step() {
        let mut sim = sim_with_noops(16);
        {
            let mut session = Session::new(&mut sim, ZipDecoder::new(), fast_config());
            assert!(session.launch().unwrap());
            let mut console = ScriptedConsole::keys("g");
            assert_eq!(session.run(&mut console).unwrap(), SessionState::Running);
            assert_eq!(console.frames.len(), 1);
        }

        assert!(!sim.is_halted());
        assert!(sim.is_closed());
        assert_eq!(sim.commands().last(), Some(&ctrl::GO));
        assert!(sim
            .commands()
            .iter()
            .all(|command| command & (ctrl::RESET | ctrl::STEP) == 0));
    }

    #[test]
    fn test_quit_leaves_cpu_halted() {
        let mut sim = sim_with_noops(16);
        {
            let mut session = Session::new(&mut sim, ZipDecoder::new(), fast_config());
            session.launch().unwrap();
            let mut console = ScriptedConsole::keys("xQ");
            assert_eq!(session.run(&mut console).unwrap(), SessionState::Terminated);
        }

        assert!(sim.is_halted());
        assert!(sim.is_closed());
        assert!(!sim.commands().contains(&ctrl::GO));
    }

    #[test]
    fn test_launch_halts_and_first_refresh_reads_everything() {
        let sim = sim_with_noops(16)
            .with_register(RegisterId::Supervisor(4), 0x1234)
            .with_register(RegisterId::User(2), 0xbeef)
            .with_register(RegisterId::Peripheral(Peripheral::TimerA), 77);
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        assert!(session.launch().unwrap());
        assert_eq!(session.state(), SessionState::Halted);

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(snapshot.mode, Mode::Supervisor);
        assert_eq!(snapshot.supervisor[4], Ok(0x1234));
        assert_eq!(snapshot.user[2], Ok(0xbeef));
        assert_eq!(
            snapshot.register(RegisterId::Peripheral(Peripheral::TimerA)),
            Some(Ok(77))
        );
        assert_eq!(snapshot.pc(), Ok(BASE));
        assert_eq!(snapshot.peripherals.len(), Peripheral::ALL.len());
        assert!(snapshot.faults().is_empty());

        // Nothing changed, nothing to redraw.
        assert_eq!(session.refresh().unwrap(), None);
    }

    #[test]
    fn test_pipeline_reads_around_pc() {
        let sim = sim_with_noops(32).with_register(RegisterId::Supervisor(15), 0x8010);
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        let addresses: Vec<(PipelineStage, u32)> = snapshot
            .pipeline
            .iter()
            .map(|stage| (stage.stage, stage.address))
            .collect();
        assert_eq!(
            addresses,
            vec![
                (PipelineStage::Fetch, 0x8012),
                (PipelineStage::Decode, 0x8011),
                (PipelineStage::Operate, 0x8010),
                (PipelineStage::Align, 0x800f),
            ]
        );
        for stage in &snapshot.pipeline {
            match &stage.fetch {
                StageFetch::Word { word, mnemonic } => {
                    assert_eq!(*word, 0x4e00_0000);
                    assert_eq!(mnemonic.primary, "NOOP");
                }
                StageFetch::BusError { .. } => panic!("unexpected fault at {:08x}", stage.address),
            }
        }
    }

    #[test]
    fn test_pipeline_fault_is_a_placeholder() {
        let mut sim = sim_with_noops(4);
        sim.fail_address(BASE + 2);
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(
            snapshot.pipeline[0].fetch,
            StageFetch::BusError { address: BASE + 2 }
        );
        // pc-1 is below the loaded image.
        assert_eq!(
            snapshot.pipeline[3].fetch,
            StageFetch::BusError { address: BASE - 1 }
        );
        assert!(matches!(snapshot.pipeline[2].fetch, StageFetch::Word { .. }));
        assert!(!session.bus().has_fault());

        let screen = Screen::from_view(&View::Halted(snapshot));
        assert_eq!(
            screen.row_text(19),
            "I : 0x00008002 0x00008002  (Bus Error)"
        );
        assert_eq!(screen.row_text(21), "Op: 0x00008000 0x4e000000  NOOP");
    }

    #[test]
    fn test_register_fault_is_isolated() {
        let mut sim = sim_with_noops(16)
            .with_register(RegisterId::Supervisor(3), 0x3333)
            .with_register(RegisterId::Supervisor(4), 0x4444);
        sim.fail_register(RegisterId::Supervisor(3));
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(
            snapshot.supervisor[3],
            Err(RegisterFault {
                register: RegisterId::Supervisor(3),
                address: DebugPort::DEFAULT_DATA,
            })
        );
        assert_eq!(snapshot.supervisor[4], Ok(0x4444));
        assert_eq!(snapshot.faults().len(), 1);
        assert!(!session.bus().has_fault());

        let screen = Screen::from_view(&View::Halted(snapshot));
        let row = screen.row_text(6);
        assert!(row.contains("sR3 : (bus err)"), "{row}");
    }

    #[test]
    fn test_faulted_pc_hides_pipeline() {
        let mut sim = sim_with_noops(16);
        sim.fail_register(RegisterId::Supervisor(15));
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        assert!(snapshot.pipeline.is_empty());
        let screen = Screen::from_view(&View::Halted(snapshot));
        assert!(screen.row_text(19).contains("PC unavailable"));
    }

    #[test]
    fn test_faulted_cc_means_supervisor_mode() {
        let mut sim = sim_with_noops(16).with_register(RegisterId::Supervisor(14), 0x20);
        sim.fail_register(RegisterId::Supervisor(14));
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(snapshot.mode, Mode::Supervisor);
        assert_eq!(snapshot.condition_codes(Mode::Supervisor), None);
    }

    #[test]
    fn test_step_advances_and_returns_to_halted() {
        let mut session = Session::new(sim_with_noops(16), ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        assert_eq!(halted_snapshot(&mut session).pc(), Ok(BASE));

        assert_eq!(
            session.dispatch(zipmon_core::debugger::Command::Step).unwrap(),
            Flow::Continue
        );
        assert_eq!(session.state(), SessionState::Stepping);

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(session.state(), SessionState::Halted);
        assert_eq!(snapshot.pc(), Ok(BASE + 1));
        assert_eq!(
            snapshot.register(RegisterId::Peripheral(Peripheral::Jiffies)),
            Some(Ok(1))
        );
    }

    #[test]
    fn test_step_key_redraws_with_new_pc() {
        let mut sim = sim_with_noops(16);
        {
            let mut session = Session::new(&mut sim, ZipDecoder::new(), fast_config());
            session.launch().unwrap();
            let mut console = ScriptedConsole::new(&[None, Some('s'), None]);
            assert_eq!(session.run(&mut console).unwrap(), SessionState::Terminated);

            assert_eq!(console.frames.len(), 2);
            assert_eq!(
                console.frames[0].row_text(21),
                "Op: 0x00008000 0x4e000000  NOOP"
            );
            assert_eq!(
                console.last_frame().row_text(21),
                "Op: 0x00008001 0x4e000000  NOOP"
            );
        }
        assert!(sim.commands().contains(&CpuControl::step()));
    }

    #[test]
    fn test_reset_clears_console_and_registers() {
        let sim = sim_with_noops(16)
            .with_register(RegisterId::Supervisor(4), 7)
            .with_register(RegisterId::Supervisor(15), BASE + 5);
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        assert_eq!(halted_snapshot(&mut session).supervisor[4], Ok(7));

        assert_eq!(
            session.dispatch(zipmon_core::debugger::Command::Reset).unwrap(),
            Flow::Clear
        );
        assert!(session.bus().is_halted());
        assert!(session.bus().commands().contains(&CpuControl::reset()));

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(snapshot.supervisor[4], Ok(0));
        assert_eq!(snapshot.pc(), Ok(BASE));
    }

    #[test]
    fn test_reset_key_asks_console_to_clear() {
        let mut session = Session::new(sim_with_noops(16), ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        let mut console = ScriptedConsole::keys("r");
        session.run(&mut console).unwrap();
        assert_eq!(console.clears, 1);
        assert_eq!(console.frames.len(), 2);
    }

    #[test]
    fn test_user_mode_swaps_emphasis() {
        let sim = sim_with_noops(16)
            .with_register(RegisterId::Supervisor(14), 0x21)
            .with_register(RegisterId::User(15), BASE + 1);
        let mut session = Session::new(sim, ZipDecoder::new(), fast_config());
        session.launch().unwrap();

        let snapshot = halted_snapshot(&mut session);
        assert_eq!(snapshot.mode, Mode::User);
        assert_eq!(snapshot.pc(), Ok(BASE + 1));
        assert_eq!(snapshot.pipeline[2].address, BASE + 1);

        let screen = Screen::from_view(&View::Halted(snapshot));
        assert_eq!(screen.is_bold("User Registers"), Some(true));
        assert_eq!(screen.is_bold("Supervisor Registers"), Some(false));
        assert_eq!(screen.is_bold("NOOP"), Some(false));
        assert!(screen.row_text(9).contains("sCC :   GIE      Z"));
    }

    #[test]
    fn test_supervisor_mode_emphasis() {
        let mut session = Session::new(sim_with_noops(16), ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        let screen = Screen::from_view(&View::Halted(halted_snapshot(&mut session)));
        assert_eq!(screen.is_bold("Supervisor Registers"), Some(true));
        assert_eq!(screen.is_bold("User Registers"), Some(false));
        assert_eq!(screen.is_bold("NOOP"), Some(true));
        assert!(screen.row_text(0).contains("CPU State: Supervisor Mod"));
    }

    #[test]
    fn test_running_cpu_shows_running_view_once() {
        let mut session = Session::new(sim_with_noops(16), ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        halted_snapshot(&mut session);

        session.bus_mut().release();
        let view = session.refresh().unwrap();
        assert_eq!(view, Some(View::Running));
        assert_eq!(session.refresh().unwrap(), None);

        let screen = Screen::from_view(&View::Running);
        assert_eq!(screen.row_text(0), "CPU is running");
    }

    #[test]
    fn test_stuck_cpu_times_out() {
        let mut sim = sim_with_noops(16);
        sim.set_stuck(true);
        let config = SessionConfig {
            stall_timeout: Some(Duration::from_millis(20)),
            ..fast_config()
        };
        let mut session = Session::new(sim, ZipDecoder::new(), config);

        assert!(!session.launch().unwrap());
        assert_eq!(session.state(), SessionState::Halted);
        assert_eq!(session.refresh().unwrap(), Some(View::Running));
        assert_eq!(session.state(), SessionState::Halted);

        let err = session.cmd_read(RegisterId::Supervisor(2)).unwrap_err();
        assert!(matches!(err, BusError::StallTimeout { select: 2, .. }));
    }

    #[test]
    fn test_closed_bus_ends_session() {
        let mut session = Session::new(sim_with_noops(16), ZipDecoder::new(), fast_config());
        session.launch().unwrap();
        session.bus_mut().close();
        let mut console = ScriptedConsole::keys("");
        assert!(session.run(&mut console).is_err());
    }
}
