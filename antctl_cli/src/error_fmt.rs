//! Human-readable error descriptions and structured JSON error formatting.

use antctl_core::error::ControlError;

/// Stable name of the error kind, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::WiringTableInconsistency(_)) => "WiringTableInconsistency",
        Some(ControlError::Hardware(_) | ControlError::HardwareFault(_)) => "Hardware",
        Some(ControlError::SettleTimeout { .. }) => "SettleTimeout",
        Some(ControlError::DegenerateCalibration { .. }) => "DegenerateCalibration",
        Some(ControlError::Config(_)) => "Config",
        Some(ControlError::Io(_)) => "Io",
        Some(_) => "Command",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::WiringTableInconsistency(msg) => format!(
                "What happened: The connector wiring table is inconsistent ({msg}).\nLikely causes: A field is missing a bit, has a duplicate bit, or a wiring correction relabels only part of a group.\nHow to fix: Review the wiring corrections in use (wiring.apply_suspected_swaps) and run `antctl wiring` to inspect the stage table."
            ),
            ControlError::Hardware(msg) | ControlError::HardwareFault(msg) => format!(
                "What happened: A board device failed ({msg}).\nLikely causes: Wrong pin or SPI select numbers, missing permissions for GPIO/SPI, or a wiring fault.\nHow to fix: Check [pins] in the config and that the process can access /dev/gpiomem and /dev/spidev*."
            ),
            ControlError::SettleTimeout { rail, .. } => format!(
                "What happened: The {rail} rail did not settle during calibration.\nLikely causes: A noisy rail or a tolerance that is too tight.\nHow to fix: Raise calibration.settle_tolerance or calibration.settle_timeout_ms in the config."
            ),
            ControlError::DegenerateCalibration { rail, .. } => format!(
                "What happened: Both {rail} calibration points read the same ADC count; the previous calibration is kept.\nLikely causes: The potentiometer is not reaching the rail, or the ADC input is disconnected.\nHow to fix: Check the rail wiring and pot channel, then calibrate again."
            ),
            ControlError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Both rails wired to the same pot channel.\nHow to fix: Give [rails.fixed] and [rails.adjustable] different pot numbers."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("failed to read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Check the --config path, or omit it to run with board defaults."
        );
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values or a malformed section in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    // Generic fallback
    let cause = err
        .chain()
        .nth(1)
        .map(|src| format!(" Cause: {src}"))
        .unwrap_or_default();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// A broken wiring table exits with 2; everything else with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ControlError>() {
        Some(ControlError::WiringTableInconsistency(_)) => 2,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
