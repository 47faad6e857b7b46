//! Board assembly: config mapping and backend selection.

use antctl_config::Config;
use antctl_core::{AntennaBoard, BoardConfig, BoardIo, FileCalibrationStore};
use antctl_traits::MonotonicClock;
use eyre::Result;

/// Devices of the simulated board; used unless built with `hardware`.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_io(_cfg: &Config) -> Result<BoardIo> {
    let sim = antctl_hardware::SimBoard::new();
    tracing::info!("using simulated board");
    Ok(BoardIo {
        lines: Box::new(sim.chain.clone()),
        adc: Box::new(sim.plant.adc()),
        pots: Box::new(sim.plant.pots()),
        leds: Box::new(sim.leds.clone()),
        power: Box::new(sim.power.clone()),
        mode: Box::new(sim.mode.clone()),
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_io(cfg: &Config) -> Result<BoardIo> {
    use antctl_hardware::gpio::{
        Gpio, GpioLedChain, GpioModePins, GpioPower, GpioShiftLines, LedPins, ShiftPins,
    };
    use antctl_hardware::spi::{AdcInputs, Mcp3208, Mcp42010};
    use eyre::WrapErr;

    let p = &cfg.pins;
    let gpio = Gpio::new().wrap_err("open gpio")?;
    let lines = GpioShiftLines::open(
        &gpio,
        ShiftPins {
            ser: p.sr_ser,
            oe_n: p.sr_oe,
            srclk: p.sr_srclk,
            rclk: p.sr_rclk,
            serial_out: p.sr_out,
        },
    )
    .wrap_err("open shift-register pins")?;
    let leds = GpioLedChain::open(
        &gpio,
        LedPins {
            oe_n: p.led_oe,
            rck: p.led_rck,
            srclr_n: p.led_srclr,
            srck: p.led_srck,
            ser: p.led_ser,
        },
        std::time::Duration::from_nanos(cfg.indicator.settle_ns),
    )
    .wrap_err("open led pins")?;
    let power = GpioPower::open(&gpio, p.fan, p.power_latch).wrap_err("open power pins")?;
    let mode = GpioModePins::open(&gpio, p.mode).wrap_err("open mode pins")?;
    let pots = Mcp42010::open(p.pot_spi_ss).wrap_err("open potentiometer spi")?;
    let adc = Mcp3208::open(
        p.adc_spi_ss,
        AdcInputs {
            fixed_rail: p.adc_inputs[0],
            adjustable_rail: p.adc_inputs[1],
            antenna_sense: p.adc_inputs[2],
        },
    )
    .wrap_err("open adc spi")?;
    tracing::info!("using hardware board");
    Ok(BoardIo {
        lines: Box::new(lines),
        adc: Box::new(adc),
        pots: Box::new(pots),
        leds: Box::new(leds),
        power: Box::new(power),
        mode: Box::new(mode),
    })
}

/// Build the board from config. Wiring is resolved here, so a broken table
/// fails before any device is driven.
pub fn build_board(cfg: &Config) -> Result<AntennaBoard> {
    // Runtime config comes from the From impls in antctl_core::conversions
    let board_cfg = BoardConfig::from(cfg);
    let io = open_io(cfg)?;
    let store = FileCalibrationStore::new(&cfg.calibration.file);
    let board = AntennaBoard::new(
        board_cfg,
        io,
        Box::new(store),
        Box::new(MonotonicClock::new()),
    )?;
    Ok(board)
}
