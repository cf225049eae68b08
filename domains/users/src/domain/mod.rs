pub mod entities;
pub mod telemetry;
