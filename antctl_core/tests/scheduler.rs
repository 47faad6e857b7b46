mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use antctl_core::config::ControlCfg;
use antctl_core::mocks::FixedAdc;
use antctl_core::scheduler::{Due, SchedulerStats, run_due};
use antctl_core::{Field, Rail, Scheduler};
use antctl_traits::{MonotonicClock, Rgb};

const ALL_DUE: Due = Due {
    tick: true,
    indicator: true,
    heartbeat: true,
};

fn fast_periods() -> ControlCfg {
    ControlCfg {
        tick: Duration::from_millis(1),
        indicator: Duration::from_millis(5),
        heartbeat: Duration::from_millis(10),
        ..ControlCfg::default()
    }
}

#[test]
fn scheduler_runs_every_task_and_stops_cleanly() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    let sched = Scheduler::spawn(rig.board.clone(), fast_periods(), MonotonicClock::new());
    std::thread::sleep(Duration::from_millis(150));

    let stats = sched.stats();
    assert!(stats.ticks.load(Ordering::Relaxed) > 0);
    assert!(stats.heartbeats.load(Ordering::Relaxed) > 0);
    assert!(stats.indicator_refreshes.load(Ordering::Relaxed) > 0);
    assert_eq!(stats.tick_failures.load(Ordering::Relaxed), 0);
    sched.stop();

    let writes = rig.sim.plant.pot_writes();
    let updates = rig.sim.leds.updates();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(rig.sim.plant.pot_writes(), writes);
    assert_eq!(rig.sim.leds.updates(), updates);
}

#[test]
fn dropping_the_scheduler_joins_its_thread() {
    let rig = common::rig();
    {
        let _sched = Scheduler::spawn(rig.board.clone(), fast_periods(), MonotonicClock::new());
        std::thread::sleep(Duration::from_millis(20));
    }
    // Only the rig holds the board once the thread has exited.
    assert_eq!(std::sync::Arc::strong_count(&rig.board), 1);
}

#[test]
fn failing_conversions_do_not_block_indicators() {
    let rig = common::rig_with_adc(FixedAdc::new(None, None, Some(0)));
    let stats = SchedulerStats::default();
    run_due(&rig.board, ALL_DUE, &stats);

    assert_eq!(stats.ticks.load(Ordering::Relaxed), 1);
    assert_eq!(stats.tick_failures.load(Ordering::Relaxed), 2);
    assert_eq!(stats.heartbeats.load(Ordering::Relaxed), 1);
    assert_eq!(stats.indicator_refreshes.load(Ordering::Relaxed), 1);
    assert_eq!(rig.sim.leds.updates(), 1);
}

#[test]
fn indicator_frame_reflects_power_enables_and_heartbeat() {
    let rig = common::rig();
    rig.board.set_field(Field::Pe, 3).unwrap();
    assert!(rig.board.heartbeat());
    let frame = rig.board.refresh_indicators().unwrap();

    assert_eq!(frame[1], Rgb::new(false, true, true));
    assert_eq!(frame[2], Rgb::new(false, true, false));
    assert_eq!(frame[3], Rgb::new(false, true, false));
    assert_eq!(rig.sim.leds.frame(), frame);

    assert!(!rig.board.heartbeat());
    assert_eq!(rig.board.refresh_indicators().unwrap()[3], Rgb::OFF);
}

#[test]
fn mode_led_tracks_calibration_and_manual_control() {
    let rig = common::rig();
    {
        let _guard = rig.board.state().begin_calibration().unwrap();
        assert_eq!(
            rig.board.refresh_indicators().unwrap()[2],
            Rgb::new(true, false, false)
        );
    }
    rig.board.set_wiper_manual(Rail::Fixed, 0).unwrap();
    assert_eq!(
        rig.board.refresh_indicators().unwrap()[2],
        Rgb::new(true, true, false)
    );
}

#[test]
fn voltage_led_follows_the_adjustable_rail() {
    let rig = common::rig();
    rig.board.startup().unwrap();
    // 9 V falls in the last band.
    assert_eq!(
        rig.board.refresh_indicators().unwrap()[0],
        Rgb::new(true, true, true)
    );
}
