use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::reading::{ReadingPayload, RANGE_MAX, RANGE_MIN};

#[derive(Debug, Deserialize)]
struct Created {
    id: i64,
}

/// Thin HTTP client for the tracker API
#[derive(Clone)]
pub struct TrackerClient {
    http: Client,
    base_url: String,
}

impl TrackerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Creates one plan with the simulator's range and `count` devices using it
    pub async fn setup_devices(&self, count: usize, run_id: &str) -> Result<Vec<i64>> {
        let plan = self
            .create(
                "/plans",
                json!({
                    "name": format!("simulator {}", run_id),
                    "threshold_min": RANGE_MIN,
                    "threshold_max": RANGE_MAX,
                }),
            )
            .await
            .context("failed to create plan")?;

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let id = self
                .create(
                    "/devices",
                    json!({
                        "serial_number": format!("sim-{}-{}", run_id, i),
                        "name": format!("sim-dev-{}", i),
                        "year": 2020,
                        "plan_id": plan,
                    }),
                )
                .await
                .with_context(|| format!("failed to create device {}", i))?;
            ids.push(id);
        }
        Ok(ids)
    }

    pub async fn post_reading(&self, reading: &ReadingPayload) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/readings"))
            .json(reading)
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("tracker returned {}", resp.status());
        }
        Ok(())
    }

    async fn create(&self, path: &str, body: serde_json::Value) -> Result<i64> {
        let resp = self
            .http
            .post(self.url(path))
            .header("x-actor", "simulator")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("POST {} returned {}: {}", path, status, text);
        }
        Ok(resp.json::<Created>().await?.id)
    }
}
