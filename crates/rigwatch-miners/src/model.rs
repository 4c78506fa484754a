//! Miner model data

use serde::Serialize;

/// Static description of a miner model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinerModel {
    /// Display name (e.g., "S19 Pro")
    pub name: &'static str,
    /// Number of hashboard slots
    pub hashboards: u8,
    /// Chips per hashboard
    pub chips_per_board: u32,
    /// Factory hashrate in TH/s
    pub nominal_hashrate_ths: f64,
}

const fn model(name: &'static str, chips_per_board: u32, nominal_hashrate_ths: f64) -> MinerModel {
    MinerModel {
        name,
        hashboards: 3,
        chips_per_board,
        nominal_hashrate_ths,
    }
}

/// Antminer S19 variants supported by ePIC firmware
pub const EPIC_MODELS: &[MinerModel] = &[
    model("S19", 76, 95.0),
    model("S19 Pro", 114, 110.0),
    model("S19 Pro+", 120, 120.0),
    model("S19 XP", 110, 140.0),
    model("S19a", 72, 96.0),
    model("S19a Pro", 114, 110.0),
    model("S19j", 114, 90.0),
    model("S19j No PIC", 126, 90.0),
    model("S19j Pro", 126, 104.0),
    model("S19L", 76, 58.0),
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect::<String>()
        .to_lowercase()
        .replace("plus", "+")
}

/// Look up a model by name, ignoring case, spacing and "Plus"/"+" spelling
pub fn find_model(name: &str) -> Option<&'static MinerModel> {
    let wanted = normalize(name);
    EPIC_MODELS.iter().find(|m| normalize(m.name) == wanted)
}
