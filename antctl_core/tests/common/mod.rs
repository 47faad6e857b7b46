//! Shared rig for the board-level tests: a simulated board, an in-memory
//! calibration store and a manually advanced clock.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use antctl_core::mocks::MemoryCalibrationStore;
use antctl_core::{AntennaBoard, BoardConfig, BoardIo};
use antctl_hardware::SimBoard;
use antctl_traits::RailAdc;
use antctl_traits::clock::test_clock::TestClock;

pub struct Rig {
    pub board: Arc<AntennaBoard>,
    pub sim: SimBoard,
    pub store: MemoryCalibrationStore,
    pub clock: TestClock,
}

/// Defaults with the bus settle delay removed.
pub fn fast_cfg() -> BoardConfig {
    BoardConfig {
        bus_settle: Duration::ZERO,
        ..BoardConfig::default()
    }
}

pub fn sim_io(sim: &SimBoard) -> BoardIo {
    BoardIo {
        lines: Box::new(sim.chain.clone()),
        adc: Box::new(sim.plant.adc()),
        pots: Box::new(sim.plant.pots()),
        leds: Box::new(sim.leds.clone()),
        power: Box::new(sim.power.clone()),
        mode: Box::new(sim.mode.clone()),
    }
}

pub fn rig_with(cfg: BoardConfig, sim: SimBoard, store: MemoryCalibrationStore) -> Rig {
    let clock = TestClock::new();
    let board = AntennaBoard::new(
        cfg,
        sim_io(&sim),
        Box::new(store.clone()),
        Box::new(clock.clone()),
    )
    .unwrap();
    Rig {
        board: Arc::new(board),
        sim,
        store,
        clock,
    }
}

pub fn rig() -> Rig {
    rig_with(fast_cfg(), SimBoard::new(), MemoryCalibrationStore::new())
}

/// Simulated board whose rails jump straight to their steady-state voltage.
pub fn instant_sim() -> SimBoard {
    SimBoard {
        plant: antctl_hardware::SimulatedPlant::default().with_instant_response(),
        ..SimBoard::new()
    }
}

/// Simulated board with the rail ADC replaced.
pub fn rig_with_adc(adc: impl RailAdc + Send + 'static) -> Rig {
    let sim = SimBoard::new();
    let store = MemoryCalibrationStore::new();
    let clock = TestClock::new();
    let io = BoardIo {
        adc: Box::new(adc),
        ..sim_io(&sim)
    };
    let board = AntennaBoard::new(
        fast_cfg(),
        io,
        Box::new(store.clone()),
        Box::new(clock.clone()),
    )
    .unwrap();
    Rig {
        board: Arc::new(board),
        sim,
        store,
        clock,
    }
}
