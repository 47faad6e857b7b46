mod common;

use std::time::Duration;

use antctl_core::error::ControlError;
use antctl_core::{BitVector48, PatternInput, Rail};
use rstest::rstest;

#[rstest]
#[case::off(0, 0)]
#[case::below_floor(19, 0)]
#[case::floor(20, 13_107)]
#[case::half(50, 32_767)]
#[case::full(100, 65_535)]
fn fan_speed_sets_duty(#[case] percent: u8, #[case] duty: u16) {
    let rig = common::rig();
    rig.board.set_fan_speed(percent).unwrap();
    assert_eq!(rig.sim.power.fan_duty(), duty);
}

#[test]
fn fan_speed_above_100_is_rejected() {
    let rig = common::rig();
    rig.board.set_fan_speed(40).unwrap();
    assert_eq!(rig.board.set_fan_speed(101), Err(ControlError::FanRange(101)));
    assert_eq!(rig.sim.power.fan_duty(), 26_214);
}

#[test]
fn mode_reads_three_bits() {
    let rig = common::rig();
    rig.sim.mode.set([true, false, true, true]);
    assert_eq!(rig.board.read_mode().unwrap(), 5);
    rig.sim.mode.set([false, true, false, false]);
    assert_eq!(rig.board.read_mode().unwrap(), 2);
}

#[test]
fn antenna_sense_is_a_raw_count() {
    let rig = common::rig();
    rig.sim.plant.set_sense(1_234);
    assert_eq!(rig.board.read_antenna_sense().unwrap(), 1_234);
}

#[test]
fn startup_drives_initial_wipers() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    // Logical 255 on both rails; the adjustable pot is wired inverted.
    assert_eq!(rig.sim.plant.code(0), 0);
    assert_eq!(rig.sim.plant.code(1), 255);
    let st = rig.board.state().rail_snapshot(Rail::Adjustable);
    assert!((st.filtered - 9.0).abs() < 1e-3, "{st:?}");
}

#[test]
fn shutdown_stops_fan_then_releases_latch() {
    let rig = common::rig();
    rig.board.set_fan_speed(80).unwrap();
    rig.board.shutdown().unwrap();
    assert_eq!(rig.sim.power.fan_duty(), 0);
    assert!(rig.sim.power.latch_released());
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(100));
}

#[test]
fn raw_pattern_is_latched_and_verified() {
    let rig = common::rig();
    let report = rig
        .board
        .write_raw_pattern(&"0xa5a5a5a5a5a5".parse::<PatternInput>().unwrap())
        .unwrap();
    assert!(report.matched());
    assert_eq!(rig.sim.chain.latched_value(), 0xa5a5_a5a5_a5a5);
    assert!(rig.sim.chain.outputs_enabled());
}

#[test]
fn broken_readback_is_reported_not_fatal() {
    let rig = common::rig();
    rig.sim.chain.stick_serial_out(Some(true));
    let report = rig
        .board
        .write_raw_pattern(&PatternInput::Integer(0))
        .unwrap();
    assert!(!report.matched());
    assert_eq!(report.mismatched_stages().len(), 48);
    assert_eq!(rig.sim.chain.latched_value(), 0);
}

#[test]
fn chain_check_restores_previous_pattern() {
    let rig = common::rig();
    rig.board.set_field(antctl_core::Field::El, 2).unwrap();
    let before = rig.sim.chain.latched_value();
    let report = rig
        .board
        .check_chain(BitVector48::from_u64_masked(0xa5a5_a5a5_a5a5))
        .unwrap();
    assert!(report.matched());
    assert_eq!(rig.sim.chain.latched_value(), before);
}

#[test]
fn chain_check_restores_after_readback_fault() {
    let rig = common::rig();
    rig.sim.chain.preload(0x1234);
    // The snapshot read succeeds; the test pattern's readback fails midway.
    rig.sim.chain.fail_reads_after(Some(48 + 10));
    assert!(matches!(
        rig.board
            .check_chain(BitVector48::from_u64_masked(0xa5a5_a5a5_a5a5)),
        Err(ControlError::Hardware(_))
    ));
    assert_eq!(rig.sim.chain.latched_value(), 0x1234);
}

#[rstest]
#[case::shared(0, 0)]
#[case::out_of_range(2, 0)]
fn rails_need_distinct_pot_channels(#[case] fixed: u8, #[case] adjustable: u8) {
    let mut cfg = common::fast_cfg();
    cfg.fixed.wiring.pot = fixed;
    cfg.adjustable.wiring.pot = adjustable;
    let sim = antctl_hardware::SimBoard::new();
    let built = antctl_core::AntennaBoard::new(
        cfg,
        common::sim_io(&sim),
        Box::new(antctl_core::mocks::MemoryCalibrationStore::new()),
        Box::new(antctl_traits::clock::test_clock::TestClock::new()),
    );
    assert!(matches!(built.err(), Some(ControlError::Config(_))));
}

#[test]
fn bad_pattern_never_reaches_the_chain() {
    let rig = common::rig();
    rig.sim.chain.preload(0x1234);
    let pulses = rig.sim.chain.latch_pulses();
    assert!(matches!(
        rig.board.write_raw_pattern(&PatternInput::Bits(vec![0; 12])),
        Err(ControlError::InvalidLength(12))
    ));
    assert_eq!(rig.sim.chain.latch_pulses(), pulses);
    assert_eq!(rig.sim.chain.latched_value(), 0x1234);
}

#[test]
fn pot_channels_resolve_to_rails() {
    let rig = common::rig();
    assert_eq!(rig.board.rail_for_pot(0), Some(Rail::Adjustable));
    assert_eq!(rig.board.rail_for_pot(1), Some(Rail::Fixed));
    assert_eq!(rig.board.rail_for_pot(2), None);
}

#[test]
fn diagnostics_report_raw_and_calibrated_values() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    let d = rig.board.rail_diagnostics(Rail::Fixed).unwrap();
    assert_eq!(d.rail, Rail::Fixed);
    assert!((d.volts - d.record.voltage(d.raw)).abs() < 1e-12);
    assert_eq!(d.state.wiper, 255);
    assert_eq!(d.state.target, 3.3);
}
