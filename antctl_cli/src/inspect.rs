//! Non-interactive subcommands: `wiring` and `self-check`.

use antctl_config::Config;
use antctl_core::wiring::{SUSPECTED_SWAPS, StageMap};
use antctl_core::{BitVector48, Field, FieldGroups};
use eyre::Result;
use serde_json::json;

use crate::backend::build_board;

/// Alternating bits so a stuck line or a shifted chain cannot read back clean.
const CHECK_PATTERN: u64 = 0xa5a5_a5a5_a5a5;

pub fn wiring(cfg: &Config, swaps: bool, json: bool) -> Result<()> {
    let corrections = if swaps || cfg.wiring.apply_suspected_swaps {
        vec![SUSPECTED_SWAPS]
    } else {
        Vec::new()
    };
    let map = StageMap::board(&corrections)?;
    let groups = FieldGroups::from_stage_map(&map)?;

    if json {
        let stages: Vec<_> = map
            .entries()
            .map(|e| json!({ "stage": e.stage, "pin": e.pin, "signal": e.signal }))
            .collect();
        let fields: serde_json::Map<_, _> = Field::ALL
            .into_iter()
            .map(|f| (f.name().to_string(), json!(groups.stages(f))))
            .collect();
        let names: Vec<_> = corrections.iter().map(|c| c.name).collect();
        let out = json!({
            "corrections": names,
            "stages": stages,
            "unrouted_pins": map.unrouted_pins(),
            "fields": fields,
        });
        println!("{out}");
        return Ok(());
    }

    println!("stage  pin  signal");
    for e in map.entries() {
        println!("{:>5}  {:>3}  {}", e.stage, e.pin, e.signal);
    }
    let unrouted: Vec<String> = map.unrouted_pins().iter().map(u8::to_string).collect();
    println!("unrouted pins: {}", unrouted.join(", "));
    for f in Field::ALL {
        println!("{f} stages: {:?}", groups.stages(f));
    }
    Ok(())
}

/// Resolve the wiring, push a test pattern through the chain, then restore
/// what was latched before.
pub fn self_check(cfg: &Config, json: bool) -> Result<()> {
    let board = build_board(cfg)?;
    let report = board.check_chain(BitVector48::from_u64_masked(CHECK_PATTERN))?;
    if !report.matched() {
        eyre::bail!(
            "chain read-back mismatch at stages {:?} (wrote {}, read {})",
            report.mismatched_stages(),
            report.written,
            report.readback
        );
    }
    if json {
        println!("{}", json!({ "status": "ok", "stages": 48 }));
    } else {
        println!("self-check ok: wiring resolved, chain read-back verified");
    }
    Ok(())
}
