use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Value range of the plan the simulator installs
pub const RANGE_MIN: f64 = 10.0;
pub const RANGE_MAX: f64 = 90.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingPayload {
    pub device_id: i64,
    pub value: f64,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
}

/// Mostly in-range values; `outlier_ratio` of them fall outside the plan range
pub fn generate_reading(rng: &mut impl Rng, device_id: i64, outlier_ratio: f64) -> ReadingPayload {
    let value = if rng.gen_bool(outlier_ratio.clamp(0.0, 1.0)) {
        if rng.gen_bool(0.5) {
            rng.gen_range(RANGE_MAX + 0.5..RANGE_MAX * 1.5)
        } else {
            rng.gen_range(-RANGE_MIN..RANGE_MIN - 0.5)
        }
    } else {
        rng.gen_range(RANGE_MIN..=RANGE_MAX)
    };

    ReadingPayload {
        device_id,
        value,
        at: Utc::now(),
        operator_id: Some("simulator".to_string()),
    }
}
