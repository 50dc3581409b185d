use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::metrics::READINGS_TOTAL;
use crate::model::{DeviceId, Reading};
use crate::ports::{CreateReadingInput, ReadingRepository};
use crate::usecase::alerts::{AlertComputer, ComputeAlertInput};
use crate::validate::non_empty;

#[derive(Debug, Clone)]
pub struct AddReadingCommand {
    pub device_id: DeviceId,
    pub value: f64,
    /// `None` uses the ingestion time
    pub at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub operator_id: Option<String>,
}

/// Reading ingestion and queries
pub struct ReadingService {
    readings: Arc<dyn ReadingRepository>,
    alert_computer: Option<Arc<dyn AlertComputer>>,
}

impl ReadingService {
    pub fn new(readings: Arc<dyn ReadingRepository>) -> Self {
        Self {
            readings,
            alert_computer: None,
        }
    }

    /// Runs alert computation after every successful insert
    pub fn with_alert_computer(mut self, computer: Arc<dyn AlertComputer>) -> Self {
        self.alert_computer = Some(computer);
        self
    }

    /// Stores the reading. The follow-up alert computation never affects the
    /// result: its outcome and errors are only logged.
    pub async fn ingest(&self, cmd: AddReadingCommand) -> Result<Reading> {
        if !cmd.value.is_finite() {
            return Err(Error::Validation(format!(
                "value {} is not a finite number",
                cmd.value
            )));
        }

        let reading = self
            .readings
            .create(CreateReadingInput {
                device_id: cmd.device_id,
                at: cmd.at,
                value: cmd.value,
                location: non_empty(cmd.location),
                operator_id: non_empty(cmd.operator_id),
            })
            .await?;

        READINGS_TOTAL.inc();
        debug!(
            device_id = reading.device_id,
            reading_id = reading.id,
            value = reading.value,
            "Reading stored"
        );

        if let Some(computer) = &self.alert_computer {
            let input = ComputeAlertInput {
                device_id: reading.device_id,
            };
            match computer.compute(input).await {
                Ok(out) if out.created => {
                    debug!(device_id = reading.device_id, "Reading opened an alert");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        device_id = reading.device_id,
                        reading_id = reading.id,
                        error = %e,
                        "Alert computation after ingestion failed"
                    );
                }
            }
        }

        Ok(reading)
    }

    pub async fn last(&self, device_id: DeviceId) -> Result<Reading> {
        self.readings
            .last_by_device(device_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("no readings for device {}", device_id)))
    }

    pub async fn list(&self, device_id: DeviceId, limit: i64, offset: i64) -> Result<Vec<Reading>> {
        self.readings.list_by_device(device_id, limit, offset).await
    }
}
