pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod ports;
pub mod rest;
pub mod usecase;
pub mod validate;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use ports::{
    AlertRepository, DeviceRepository, MaintenanceRepository, Notifier, PlanRepository,
    ReadingRepository,
};
use rest::AppState;
use usecase::{
    AlertComputer, AlertService, DeviceService, MaintenanceService, PlanService, ReadingService,
};

/// The full set of repository adapters the services run on
#[derive(Clone)]
pub struct Repositories {
    pub devices: Arc<dyn DeviceRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub readings: Arc<dyn ReadingRepository>,
    pub alerts: Arc<dyn AlertRepository>,
    pub maintenance: Arc<dyn MaintenanceRepository>,
}

/// Wires the services over `repos`. With `auto_compute_alerts` every ingested
/// reading is followed by an alert computation for its device.
pub fn build_state(
    repos: Repositories,
    auto_compute_alerts: bool,
    notifier: Option<Arc<dyn Notifier>>,
) -> AppState {
    let mut alert_service = AlertService::new(
        repos.readings.clone(),
        repos.devices.clone(),
        repos.plans.clone(),
        repos.alerts.clone(),
    );
    if let Some(notifier) = notifier {
        alert_service = alert_service.with_notifier(notifier);
    }
    let alerts = Arc::new(alert_service);

    let mut readings = ReadingService::new(repos.readings.clone());
    if auto_compute_alerts {
        let computer: Arc<dyn AlertComputer> = alerts.clone();
        readings = readings.with_alert_computer(computer);
    }

    AppState {
        devices: Arc::new(DeviceService::new(
            repos.devices.clone(),
            repos.plans.clone(),
            repos.alerts.clone(),
        )),
        plans: Arc::new(PlanService::new(repos.plans.clone())),
        readings: Arc::new(readings),
        alerts,
        maintenance: Arc::new(MaintenanceService::new(repos.devices, repos.maintenance)),
    }
}
