//! ePIC firmware field extractors
//!
//! Most fields come from the `summary` command, so a full poll of an ePIC
//! miner costs three requests: `summary`, `network` and `hashrate`.

use rigwatch_core::{Fan, HashBoard, Pool, PoolGroup, RegistryError, SharedResourceRef, TelemetryValue};
use rigwatch_engine::{extractor, lookup, Dependencies, ExtractError, ExtractResult, Registry};
use rigwatch_web::api::commands;
use serde_json::Value;

use crate::model::MinerModel;

const SUMMARY: &str = "web_summary";
const NETWORK: &str = "web_network";
const HASHRATE: &str = "web_hashrate";

fn summary() -> SharedResourceRef {
    SharedResourceRef::new(SUMMARY, commands::SUMMARY)
}

fn network() -> SharedResourceRef {
    SharedResourceRef::new(NETWORK, commands::NETWORK)
}

fn hashrate_ref() -> SharedResourceRef {
    SharedResourceRef::new(HASHRATE, commands::HASHRATE)
}

fn schema(path: &str) -> ExtractError {
    ExtractError::Schema(path.to_string())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Hashrates are reported in MH/s
fn mhs_to_ths(v: f64) -> f64 {
    v / 1_000_000.0
}

fn summary_str(deps: &Dependencies, key: &str) -> ExtractResult {
    let value = lookup(deps.require(SUMMARY)?, &[key])?;
    Ok(value.as_str().map(TelemetryValue::from))
}

fn summary_int(deps: &Dependencies, path: &[&str]) -> ExtractResult {
    let value = lookup(deps.require(SUMMARY)?, path)?;
    Ok(value.as_f64().map(|v| TelemetryValue::Integer(v.round() as i64)))
}

fn boards(deps: &Dependencies) -> Result<&Vec<Value>, ExtractError> {
    lookup(deps.require(SUMMARY)?, &["HBs"])?
        .as_array()
        .ok_or_else(|| schema("HBs"))
}

/// Field the firmware does not expose
fn unsupported(_deps: &Dependencies) -> ExtractResult {
    Ok(None)
}

fn mac(deps: &Dependencies) -> ExtractResult {
    let value = lookup(deps.require(NETWORK)?, &["dhcp", "mac_address"])?;
    Ok(value.as_str().map(|m| TelemetryValue::from(m.to_uppercase())))
}

fn fw_ver(deps: &Dependencies) -> ExtractResult {
    summary_str(deps, "Software")
}

fn hostname(deps: &Dependencies) -> ExtractResult {
    summary_str(deps, "Hostname")
}

fn hashrate(deps: &Dependencies) -> ExtractResult {
    let boards = deps
        .require(HASHRATE)?
        .as_array()
        .ok_or_else(|| schema("hashrate"))?;

    let mut total = 0.0;
    for board in boards {
        let rate = lookup(board, &["Total"])?
            .get(0)
            .and_then(Value::as_f64)
            .ok_or_else(|| schema("Total[0]"))?;
        total += mhs_to_ths(rate);
    }
    Ok(Some(round2(total).into()))
}

fn hashboards(deps: &Dependencies, model: &MinerModel) -> ExtractResult {
    let mut result: Vec<HashBoard> = (0..model.hashboards)
        .map(|slot| HashBoard::empty(slot, model.chips_per_board))
        .collect();

    for (idx, hb) in boards(deps)?.iter().enumerate() {
        if idx >= result.len() {
            result.push(HashBoard::empty(idx as u8, model.chips_per_board));
        }
        let board = &mut result[idx];
        board.hashrate = hb
            .get("Hashrate")
            .and_then(|h| h.get(0))
            .and_then(Value::as_f64)
            .map(|h| round2(mhs_to_ths(h)));
        board.temp = hb.get("Temperature").and_then(Value::as_f64).map(round2);
        board.chip_temp = board.temp;
        board.missing = false;
    }

    Ok(Some(result.into()))
}

fn wattage(deps: &Dependencies) -> ExtractResult {
    summary_int(deps, &["Power Supply Stats", "Input Power"])
}

fn wattage_limit(deps: &Dependencies) -> ExtractResult {
    summary_int(deps, &["Power Supply Stats", "Target Power"])
}

/// Fan speeds in the order the device lists them
fn fans(deps: &Dependencies) -> ExtractResult {
    let rpm = lookup(deps.require(SUMMARY)?, &["Fans Rpm"])?
        .as_object()
        .ok_or_else(|| schema("Fans Rpm"))?;

    let fans: Vec<Fan> = rpm
        .values()
        .map(|v| Fan {
            speed: v.as_f64().map(|s| s.round() as i64),
        })
        .collect();
    Ok(Some(fans.into()))
}

/// Mean board temperature
fn env_temp(deps: &Dependencies) -> ExtractResult {
    let temps: Vec<f64> = boards(deps)?
        .iter()
        .filter_map(|hb| hb.get("Temperature").and_then(Value::as_f64))
        .collect();

    if temps.is_empty() {
        return Ok(None);
    }
    let mean = temps.iter().sum::<f64>() / temps.len() as f64;
    Ok(Some(round2(mean).into()))
}

fn pools(deps: &Dependencies) -> ExtractResult {
    let configs = lookup(deps.require(SUMMARY)?, &["StratumConfigs"])?
        .as_array()
        .ok_or_else(|| schema("StratumConfigs"))?;

    let mut pools = Vec::with_capacity(configs.len());
    for config in configs {
        let url = lookup(config, &["pool"])?.as_str().ok_or_else(|| schema("pool"))?;
        let user = lookup(config, &["login"])?.as_str().ok_or_else(|| schema("login"))?;
        pools.push(Pool {
            url: url
                .replace("stratum+tcp://", "")
                .replace("stratum2+tcp://", ""),
            user: user.to_string(),
        });
    }

    Ok(Some(vec![PoolGroup { quota: 1, pools }].into()))
}

fn is_mining(deps: &Dependencies) -> ExtractResult {
    let state = lookup(deps.require(SUMMARY)?, &["Status", "Operating State"])?;
    Ok(state.as_str().map(|s| TelemetryValue::Bool(s == "Mining")))
}

fn uptime(deps: &Dependencies) -> ExtractResult {
    summary_int(deps, &["Session", "Uptime"])
}

/// Build the field registry for an ePIC-firmware miner of the given model
pub fn registry(model: MinerModel) -> Result<Registry, RegistryError> {
    let mut r = Registry::new();

    r.register("mac", extractor(mac), vec![network()])?;
    r.register(
        "model",
        extractor(move |_: &Dependencies| Ok(Some(TelemetryValue::Text(format!("{} (ePIC)", model.name))))),
        vec![],
    )?;
    r.register("api_ver", extractor(unsupported), vec![])?;
    r.register("fw_ver", extractor(fw_ver), vec![summary()])?;
    r.register("hostname", extractor(hostname), vec![summary()])?;
    r.register("hashrate", extractor(hashrate), vec![hashrate_ref()])?;
    r.register(
        "nominal_hashrate",
        extractor(move |_: &Dependencies| Ok(Some(TelemetryValue::Float(model.nominal_hashrate_ths)))),
        vec![],
    )?;
    r.register(
        "hashboards",
        extractor(move |deps: &Dependencies| hashboards(deps, &model)),
        vec![summary()],
    )?;
    r.register("wattage", extractor(wattage), vec![summary()])?;
    r.register("wattage_limit", extractor(wattage_limit), vec![summary()])?;
    r.register("fans", extractor(fans), vec![summary()])?;
    r.register("fan_psu", extractor(unsupported), vec![])?;
    r.register("env_temp", extractor(env_temp), vec![summary()])?;
    r.register("temperature_avg", extractor(env_temp), vec![summary()])?;
    r.register("errors", extractor(unsupported), vec![])?;
    r.register("fault_light", extractor(unsupported), vec![])?;
    r.register("pools", extractor(pools), vec![summary()])?;
    r.register("is_mining", extractor(is_mining), vec![summary()])?;
    r.register("uptime", extractor(uptime), vec![summary()])?;

    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::find_model;
    use rigwatch_engine::Resource;
    use serde_json::json;

    fn sample_summary() -> Value {
        json!({
            "Hostname": "epic-s19-07",
            "Software": "ePIC UMC 1.2.3",
            "Status": {"Operating State": "Mining"},
            "Session": {"Uptime": 86400},
            "Power Supply Stats": {"Input Power": 3250.4, "Target Power": 3300},
            "Fans Rpm": {"Fan1": 4200, "Fan2": 4320, "Fan3": 4260, "Fan4": 4290},
            "HBs": [
                {"Index": 0, "Hashrate": [36_500_000.0, 0.99], "Temperature": 62.0},
                {"Index": 1, "Hashrate": [37_250_000.0, 0.99], "Temperature": 64.0},
                {"Index": 2, "Hashrate": [36_000_000.0, 0.98], "Temperature": 66.0}
            ],
            "StratumConfigs": [
                {"pool": "stratum+tcp://btc.pool.example:3333", "login": "acct.rig07"},
                {"pool": "stratum2+tcp://backup.example:3336", "login": "acct.rig07"}
            ]
        })
    }

    fn deps(summary: Option<Value>) -> Dependencies {
        Dependencies::from_resources([
            (
                SUMMARY,
                Resource {
                    value: summary,
                    batched: true,
                },
            ),
            (
                NETWORK,
                Resource {
                    value: Some(json!({"dhcp": {"mac_address": "aa:bb:cc:00:11:22"}})),
                    batched: true,
                },
            ),
            (
                HASHRATE,
                Resource {
                    value: Some(json!([
                        {"Total": [36_500_000.0]},
                        {"Total": [37_250_000.0]},
                        {"Total": [36_000_000.0]}
                    ])),
                    batched: true,
                },
            ),
        ])
    }

    fn s19() -> MinerModel {
        *find_model("S19").unwrap()
    }

    #[test]
    fn test_simple_summary_fields() {
        let d = deps(Some(sample_summary()));
        assert_eq!(hostname(&d).unwrap(), Some(TelemetryValue::from("epic-s19-07")));
        assert_eq!(fw_ver(&d).unwrap(), Some(TelemetryValue::from("ePIC UMC 1.2.3")));
        assert_eq!(wattage(&d).unwrap(), Some(TelemetryValue::Integer(3250)));
        assert_eq!(wattage_limit(&d).unwrap(), Some(TelemetryValue::Integer(3300)));
        assert_eq!(uptime(&d).unwrap(), Some(TelemetryValue::Integer(86400)));
        assert_eq!(is_mining(&d).unwrap(), Some(TelemetryValue::Bool(true)));
        assert_eq!(mac(&d).unwrap(), Some(TelemetryValue::from("AA:BB:CC:00:11:22")));
    }

    #[test]
    fn test_hashrate_sums_boards() {
        let d = deps(None);
        assert_eq!(hashrate(&d).unwrap(), Some(TelemetryValue::Float(109.75)));
    }

    #[test]
    fn test_env_temp_is_true_mean() {
        let d = deps(Some(sample_summary()));
        assert_eq!(env_temp(&d).unwrap(), Some(TelemetryValue::Float(64.0)));

        let d = deps(Some(json!({"HBs": []})));
        assert_eq!(env_temp(&d).unwrap(), None);
    }

    #[test]
    fn test_hashboards_fill_model_slots() {
        let mut summary = sample_summary();
        summary["HBs"] = json!([{"Hashrate": [36_500_000.0], "Temperature": 61.456}]);
        let d = deps(Some(summary));

        let Some(TelemetryValue::HashBoards(boards)) = hashboards(&d, &s19()).unwrap() else {
            panic!("expected hashboards");
        };
        assert_eq!(boards.len(), 3);
        assert!(!boards[0].missing);
        assert_eq!(boards[0].hashrate, Some(36.5));
        assert_eq!(boards[0].temp, Some(61.46));
        assert_eq!(boards[0].expected_chips, 76);
        assert!(boards[1].missing);
        assert!(boards[2].missing);
    }

    #[test]
    fn test_fans_and_pools() {
        let d = deps(Some(sample_summary()));
        let Some(TelemetryValue::Fans(fans)) = fans(&d).unwrap() else {
            panic!("expected fans");
        };
        assert_eq!(fans.len(), 4);
        assert_eq!(fans[0].speed, Some(4200));

        let Some(TelemetryValue::Pools(groups)) = pools(&d).unwrap() else {
            panic!("expected pools");
        };
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].pools[0].url, "btc.pool.example:3333");
        assert_eq!(groups[0].pools[1].url, "backup.example:3336");
        assert_eq!(groups[0].pools[1].user, "acct.rig07");
    }

    #[test]
    fn test_fans_keep_device_order() {
        let summary: Value =
            serde_json::from_str(r#"{"Fans Rpm": {"Fan1": 1, "Fan2": 2, "Fan10": 10}}"#).unwrap();
        let d = deps(Some(summary));

        let Some(TelemetryValue::Fans(fans)) = fans(&d).unwrap() else {
            panic!("expected fans");
        };
        let speeds: Vec<_> = fans.iter().map(|f| f.speed).collect();
        assert_eq!(speeds, vec![Some(1), Some(2), Some(10)]);
    }

    #[test]
    fn test_missing_summary_is_an_error() {
        let d = deps(None);
        assert_eq!(
            hostname(&d),
            Err(ExtractError::MissingResource(SUMMARY.to_string()))
        );
        assert!(fans(&d).is_err());
        assert!(hashboards(&d, &s19()).is_err());
    }

    #[test]
    fn test_registry_dependencies() {
        let r = registry(s19()).unwrap();
        assert_eq!(r.len(), 19);

        let res = r.resolve(&r.field_names()).unwrap();
        let mut commands: Vec<_> = res.resources.iter().map(|x| x.fetch_command.as_str()).collect();
        commands.sort();
        assert_eq!(commands, vec!["hashrate", "network", "summary"]);
    }
}
