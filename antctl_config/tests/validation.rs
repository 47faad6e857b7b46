use antctl_config::{ColorChannel, Polarity, load_toml};
use rstest::rstest;

#[test]
fn empty_config_uses_board_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.pins.sr_ser, 6);
    assert_eq!(cfg.pins.sr_out, 10);
    assert!((cfg.adc.divider_ratio - 3.7).abs() < f64::EPSILON);
    assert_eq!(cfg.calibration.file, "rail_calibration.toml");
    assert_eq!(cfg.indicator.thresholds.len(), 7);
    assert!(!cfg.wiring.apply_suspected_swaps);
}

#[test]
fn accepts_full_config() {
    let toml = r#"
[bus]
settle_ns = 0

[control]
alpha = 0.8
deadband_v = 0.05
tick_ms = 20

[rails.fixed]
pot = 1
default_target_v = 3.3
max_target_v = 3.8

[rails.adjustable]
pot = 0
inverted = true
polarity = "rising"
default_target_v = 5.0

[calibration]
file = "/tmp/cal.toml"
settle_timeout_ms = 0

[wiring]
apply_suspected_swaps = true

[indicator]
thresholds = [{ color = [1, 0, 0], max_v = 3.3 }, [[0, 1, 0], 5.0]]
crossed_channels = ["g", "b"]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.rails.adjustable.polarity, Some(Polarity::Rising));
    assert_eq!(cfg.rails.adjustable.inverted, Some(true));
    assert_eq!(cfg.rails.fixed.initial_wiper, None);
    assert_eq!(
        cfg.indicator.thresholds,
        vec![([1, 0, 0], 3.3), ([0, 1, 0], 5.0)]
    );
    assert_eq!(
        cfg.indicator.crossed_channels,
        Some([ColorChannel::G, ColorChannel::B])
    );
}

#[rstest]
#[case("[control]\nalpha = 0.0", "control.alpha")]
#[case("[control]\nalpha = 1.5", "control.alpha")]
#[case("[control]\ntick_ms = 0", "control.tick_ms")]
#[case("[control]\ndeadband_v = -0.1", "control.deadband_v")]
#[case("[adc]\nfull_scale = 0", "adc.full_scale")]
#[case("[rails.fixed]\npot = 2", "rails.fixed.pot")]
#[case("[rails.fixed]\npot = 0", "must differ")]
#[case("[rails.adjustable]\ndefault_target_v = 12.0\nmax_target_v = 10.0", "exceeds max_target_v")]
#[case("[calibration]\npoll_ms = 0", "calibration.poll_ms")]
#[case("[calibration]\nfile = \"  \"", "calibration.file")]
#[case("[indicator]\nthresholds = []", "must not be empty")]
#[case("[indicator]\nthresholds = [[[1,0,0], 5.0], [[0,1,0], 4.0]]", "strictly ascending")]
#[case("[indicator]\nthresholds = [[[2,0,0], 5.0]]", "0/1 per channel")]
#[case("[indicator]\ncrossed_channels = [\"r\", \"r\"]", "two different channels")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}

#[test]
fn unknown_polarity_is_a_parse_error() {
    let err = load_toml("[rails.fixed]\npolarity = \"sideways\"").expect_err("bad enum");
    assert!(err.to_string().contains("sideways") || err.to_string().contains("variant"));
}
