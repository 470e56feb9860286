//! HTTP handlers for kms-service.

pub mod changes;
pub mod entities;
pub mod metrics;
pub mod verify;

pub use changes::*;
pub use entities::*;
pub use verify::*;
