mod common;

use antctl_core::error::ControlError;
use antctl_core::mocks::FixedAdc;
use antctl_core::rail::{Polarity, Regulator};
use antctl_core::Rail;
use proptest::prelude::*;
use rstest::rstest;

fn polarity_strategy() -> impl Strategy<Value = Polarity> {
    prop_oneof![Just(Polarity::Rising), Just(Polarity::Falling)]
}

proptest! {
    #[test]
    fn wiper_moves_at_most_one_step(
        filtered in 0.0f64..12.0,
        target in 0.0f64..12.0,
        wiper in any::<u8>(),
        polarity in polarity_strategy(),
    ) {
        let reg = Regulator::default();
        let next = reg.step(filtered, target, wiper, polarity);
        prop_assert!((i16::from(next) - i16::from(wiper)).abs() <= 1);
        if (filtered - target).abs() <= reg.deadband {
            prop_assert_eq!(next, wiper);
        }
    }

    #[test]
    fn filter_stays_between_previous_and_sample(
        previous in -10.0f64..10.0,
        sample in -10.0f64..10.0,
    ) {
        let f = Regulator::default().filter(previous, sample);
        prop_assert!(f >= previous.min(sample) - 1e-12);
        prop_assert!(f <= previous.max(sample) + 1e-12);
    }
}

#[rstest]
#[case::adjustable(Rail::Adjustable, 5.0)]
#[case::fixed(Rail::Fixed, 3.3)]
fn closed_loop_settles_on_target(#[case] rail: Rail, #[case] target: f64) {
    let rig = common::rig();
    rig.board.startup().unwrap();
    rig.board.set_rail_target(rail, target).unwrap();
    for _ in 0..600 {
        assert!(rig.board.regulation_tick().is_empty());
    }
    let reading = rig.board.read_rail(rail).unwrap();
    assert!((reading.volts - target).abs() < 0.1, "{reading:?}");
    assert_eq!(reading.target, target);
}

#[test]
fn manual_rail_holds_wiper_but_keeps_filtering() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    let before = rig.board.state().rail_snapshot(Rail::Adjustable);
    rig.board.set_wiper_manual(Rail::Adjustable, 100).unwrap();
    assert_eq!(rig.sim.plant.code(0), 155);

    for _ in 0..5 {
        let tick = rig.board.tick_rail(Rail::Adjustable).unwrap();
        assert!(!tick.stepped);
        assert_eq!(tick.wiper, 100);
    }
    let after = rig.board.state().rail_snapshot(Rail::Adjustable);
    assert!(!after.auto_enabled);
    assert!(after.filtered < before.filtered - 1.0, "{after:?}");
}

#[test]
fn running_calibration_freezes_the_wiper() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    {
        let _guard = rig.board.state().begin_calibration().unwrap();
        let tick = rig.board.tick_rail(Rail::Adjustable).unwrap();
        assert!(!tick.stepped);
        assert_eq!(tick.wiper, 255);
    }
    // 9 V against a 5 V target: the wiper walks down once released.
    let tick = rig.board.tick_rail(Rail::Adjustable).unwrap();
    assert!(tick.stepped);
    assert_eq!(tick.wiper, 254);
}

#[test]
fn new_target_returns_rail_to_automatic() {
    let rig = common::rig();
    rig.board.set_wiper_manual(Rail::Fixed, 10).unwrap();
    assert!(!rig.board.state().rail_snapshot(Rail::Fixed).auto_enabled);
    rig.board.set_rail_target(Rail::Fixed, 3.0).unwrap();
    let st = rig.board.state().rail_snapshot(Rail::Fixed);
    assert!(st.auto_enabled);
    assert_eq!(st.target, 3.0);
}

#[rstest]
#[case::fixed_above_max(Rail::Fixed, 4.0)]
#[case::adjustable_above_max(Rail::Adjustable, 9.5)]
#[case::negative(Rail::Adjustable, -0.1)]
#[case::not_a_number(Rail::Fixed, f64::NAN)]
fn targets_outside_the_rail_range_are_rejected(#[case] rail: Rail, #[case] volts: f64) {
    let rig = common::rig();
    let before = rig.board.state().rail_snapshot(rail).target;
    let err = rig.board.set_rail_target(rail, volts).unwrap_err();
    assert!(matches!(err, ControlError::TargetOutOfRange { rail: r, .. } if r == rail));
    assert_eq!(rig.board.state().rail_snapshot(rail).target, before);
}

#[test]
fn failing_rail_does_not_stop_the_other() {
    // About 8 V on the adjustable rail; the fixed rail conversion fails.
    let rig = common::rig_with_adc(FixedAdc::new(None, Some(42_939), Some(0)));
    let failures = rig.board.regulation_tick();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Rail::Fixed);
    assert!(matches!(failures[0].1, ControlError::Hardware(_)));

    let st = rig.board.state().rail_snapshot(Rail::Adjustable);
    assert_eq!(st.wiper, 254);
    assert_eq!(rig.sim.plant.code(0), 1);
}
