pub mod actuators;
pub mod alerts;
pub mod health;
pub mod profile;
pub mod stats;
pub mod telemetry;
