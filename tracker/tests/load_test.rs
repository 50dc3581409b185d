use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::env;
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize)]
struct ReadingPayload {
    device_id: i64,
    value: f64,
    at: chrono::DateTime<Utc>,
}

impl ReadingPayload {
    fn random(device_id: i64) -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        Self {
            device_id,
            value: rng.gen_range(15.0..85.0),
            at: Utc::now(),
        }
    }
}

fn base_url() -> String {
    env::var("TRACKER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

async fn setup_devices(client: &Client, count: usize) -> Vec<i64> {
    let base = base_url();
    let plan: Value = client
        .post(format!("{}/api/v1/plans", base))
        .json(&json!({ "name": "load-test", "threshold_min": 10.0, "threshold_max": 90.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let run = Utc::now().timestamp_millis();
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let device: Value = client
            .post(format!("{}/api/v1/devices", base))
            .json(&json!({
                "serial_number": format!("load-{}-{}", run, i),
                "name": format!("load-test-dev-{}", i),
                "year": 2020,
                "plan_id": plan["id"],
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(device["id"].as_i64().unwrap());
    }
    ids
}

#[tokio::test]
#[ignore]
async fn test_200_readings_per_second() {
    println!("\n🚀 Starting Load Test: 200 readings/s");
    println!("{}", "━".repeat(47));

    let test_duration_secs = 10;
    let target_rate = 200;
    let total_requests = test_duration_secs * target_rate;

    let client = Client::new();
    let devices = setup_devices(&client, 10).await;
    let url = format!("{}/api/v1/readings", base_url());

    println!("\n📊 Test Configuration:");
    println!("  Target Rate:    {} req/s", target_rate);
    println!("  Duration:       {} seconds", test_duration_secs);
    println!("  Total Requests: {}", total_requests);
    println!("  Devices:        {}", devices.len());

    let start = Instant::now();
    let mut sent_count = 0;
    let mut error_count = 0;

    let burst_size = 20;
    let delay_per_burst = Duration::from_micros((burst_size * 1_000_000) / target_rate as u64);

    for batch_start in (0..total_requests).step_by(burst_size as usize) {
        let mut handles = Vec::new();
        for i in batch_start..std::cmp::min(batch_start + burst_size as usize, total_requests) {
            let payload = ReadingPayload::random(devices[i % devices.len()]);
            let client = client.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                client.post(&url).json(&payload).send().await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Ok(resp) if resp.status().is_success() => sent_count += 1,
                Ok(resp) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Unexpected status: {}", resp.status());
                    }
                }
                Err(e) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Send error: {}", e);
                    }
                }
            }
        }

        sleep(delay_per_burst).await;
    }

    let duration = start.elapsed();
    let actual_rate = sent_count as f64 / duration.as_secs_f64();

    println!("\n\n✅ Test Complete!");
    println!("{}", "━".repeat(47));
    println!("\n📈 Results:");
    println!("  Total Sent:     {}", sent_count);
    println!("  Errors:         {}", error_count);
    println!("  Duration:       {:.2}s", duration.as_secs_f64());
    println!("  Actual Rate:    {:.2} req/s", actual_rate);

    assert!(
        actual_rate >= 150.0,
        "Throughput too low: {:.2} req/s (expected >= 150)",
        actual_rate
    );
    assert!(
        error_count == 0,
        "Too many errors: {} (expected 0)",
        error_count
    );
}
