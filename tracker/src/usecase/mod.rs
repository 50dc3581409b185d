pub mod alerts;
pub mod devices;
pub mod maintenance;
pub mod plans;
pub mod readings;

pub use alerts::{
    AlertComputer, AlertService, ComputeAlertInput, ComputeAlertOutput, MarkServicedInput,
};
pub use devices::{
    CreateDeviceCommand, DeviceService, UpdateDeviceBasicCommand, UpdateDevicePlanCommand,
};
pub use maintenance::MaintenanceService;
pub use plans::PlanService;
pub use readings::{AddReadingCommand, ReadingService};
