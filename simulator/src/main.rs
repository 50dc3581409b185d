mod client;
mod reading;

use anyhow::Result;
use clap::Parser;
use client::TrackerClient;
use reading::generate_reading;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "simulator", about = "Posts synthetic readings to a running tracker")]
struct Args {
    /// Base URL of the tracker
    #[arg(long, env = "TRACKER_URL", default_value = "http://localhost:8080")]
    tracker_url: String,

    /// Readings per second
    #[arg(long, env = "RATE", default_value_t = 50)]
    rate: u64,

    #[arg(long, env = "DEVICES", default_value_t = 10)]
    devices: usize,

    /// Share of readings outside the plan range
    #[arg(long, env = "OUTLIER_RATIO", default_value_t = 0.05, value_parser = parse_ratio)]
    outlier_ratio: f64,

    /// Create a plan and devices first; otherwise post to device ids 1..=DEVICES
    #[arg(long, env = "SETUP", default_value_t = true, action = clap::ArgAction::Set)]
    setup: bool,
}

const BURST_SIZE: u64 = 10;

fn parse_ratio(s: &str) -> std::result::Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{} is not a ratio between 0 and 1", s))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let rate = args.rate.max(1);
    let devices = args.devices.max(1);

    info!("Starting reading simulator");
    info!(
        "Tracker: {}, Rate: {} readings/s, Devices: {}, Outliers: {:.1}%",
        args.tracker_url,
        rate,
        devices,
        args.outlier_ratio * 100.0
    );

    let client = TrackerClient::new(&args.tracker_url);
    let device_ids: Vec<i64> = if args.setup {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let ids = client.setup_devices(devices, &run_id).await?;
        info!("Created {} devices", ids.len());
        ids
    } else {
        (1..=devices as i64).collect()
    };

    let burst_interval = Duration::from_millis((BURST_SIZE * 1000) / rate);
    info!(
        "Posting in bursts of {} readings every {:?}",
        BURST_SIZE, burst_interval
    );

    let mut rng = rand::thread_rng();
    let mut counter = 0u64;
    let mut failures = 0u64;

    loop {
        let burst_start = Instant::now();

        for _ in 0..BURST_SIZE {
            let device_id = device_ids[(counter % device_ids.len() as u64) as usize];
            let reading = generate_reading(&mut rng, device_id, args.outlier_ratio);

            match client.post_reading(&reading).await {
                Ok(()) => counter += 1,
                Err(e) => {
                    failures += 1;
                    warn!(device_id, "Failed to post reading: {}", e);
                }
            }
        }

        if counter > 0 && counter % 1000 == 0 {
            info!("Posted {} readings ({} failures)", counter, failures);
        }

        let elapsed = burst_start.elapsed();
        if elapsed < burst_interval {
            tokio::time::sleep(burst_interval - elapsed).await;
        } else if elapsed > burst_interval * 2 {
            warn!(
                "Burst took {:?}, target was {:?} - tracker may be overloaded",
                elapsed, burst_interval
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlier_ratio_must_be_finite_and_bounded() {
        for bad in ["NaN", "inf", "-0.1", "1.5", "lots"] {
            let parsed = Args::try_parse_from(["simulator", "--outlier-ratio", bad]);
            assert!(parsed.is_err(), "{} accepted", bad);
        }

        let args = Args::try_parse_from(["simulator", "--outlier-ratio", "0.25"]).unwrap();
        assert_eq!(args.outlier_ratio, 0.25);
        assert_eq!(parse_ratio("1"), Ok(1.0));
    }
}
