use async_trait::async_trait;
use tracing::warn;

use crate::errors::Result;
use crate::model::Alert;
use crate::ports::Notifier;

/// Emits every new alert as a structured warn log line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_alert(&self, alert: &Alert) -> Result<()> {
        warn!(
            alert_id = alert.id,
            device_id = alert.device_id,
            reading_id = ?alert.reading_id,
            alert_type = %alert.alert_type,
            message = %alert.message,
            "Alert opened"
        );
        Ok(())
    }
}
