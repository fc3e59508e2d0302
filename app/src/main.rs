//! Palisade daemon: loads the risk configuration, builds the engine, and
//! drives the accrual and liquidation-scan scheduler. Transport for user
//! operations is owned by the API collaborator; this binary only keeps the
//! engine's clockwork turning.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use palisade_api::EngineState;
use palisade_core::{RiskConfig, Timestamp};
use palisade_engine::Engine;

/// Seconds between accrual ticks and liquidation scans.
const TICK_INTERVAL_SECS: u64 = 15;

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

fn load_config() -> Result<RiskConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading risk config from {path}"))?;
            RiskConfig::from_json(&json).with_context(|| format!("parsing risk config {path}"))
        }
        None => {
            tracing::warn!("no config path given; starting with the built-in demo config");
            RiskConfig::from_json(DEMO_CONFIG).context("parsing built-in demo config")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("palisade=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();

    tracing::info!("starting palisade risk engine");

    let config = load_config()?;
    let version = config.version;
    let engine = Engine::new(config, unix_now())?;
    let state = EngineState::new(engine);
    tracing::info!(version, "engine ready");

    let mut ticker = tokio::time::interval(Duration::from_secs(TICK_INTERVAL_SECS));
    loop {
        ticker.tick().await;
        let now = unix_now();
        state.accrue_all(now).await;
        let summary = state.run_scan(now).await;
        if summary.executed > 0 || summary.margin_calls > 0 || summary.errors > 0 {
            tracing::info!(
                at = summary.at,
                evaluated = summary.evaluated,
                executed = summary.executed,
                margin_calls = summary.margin_calls,
                deferred = summary.deferred,
                errors = summary.errors,
                "liquidation scan"
            );
        } else {
            tracing::debug!(at = summary.at, evaluated = summary.evaluated, "liquidation scan idle");
        }
    }
}

/// Demo market: one stablecoin pool and one crypto collateral asset.
const DEMO_CONFIG: &str = r#"{
    "version": 1,
    "pools": {
        "usdc": {
            "asset": "usdc",
            "base_rate": "0.02",
            "slope_below": "0.07",
            "kink": "0.8",
            "slope_above": "0.3",
            "reserve_factor": "0.1"
        }
    },
    "collateral": {
        "wbtc": {
            "tier": "crypto",
            "max_ltv": "0.7",
            "liquidation_threshold": "0.85",
            "haircut": "0.05",
            "liquidation_penalty": "0.06"
        }
    },
    "oracle": {
        "wbtc": {
            "max_staleness_secs": 60,
            "max_deviation_bps": 500,
            "twap_window_secs": 1800
        }
    }
}"#;
