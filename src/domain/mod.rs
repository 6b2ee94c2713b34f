//! Domain models - parking events and central payloads
//!
//! - `types` - `ParkingLotEvent`, `DeviceStatusCode`, `FilterSlot`
//! - `payload` - JSON bodies for the central backend endpoints

pub mod payload;
pub mod types;

pub use payload::{Credentials, Endpoint};
pub use types::{DeviceStatusCode, FilterSlot, ParkingLotEvent};
