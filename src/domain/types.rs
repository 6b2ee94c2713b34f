//! Shared types for the lot hub

use serde::{Serialize, Serializer};
use std::fmt;

/// A park-in / park-out detection for a single parking lot.
///
/// All fields are plain strings as reported by the camera pipeline. An empty
/// string means "unset" and is written as `null` to storage and to the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParkingLotEvent {
    pub location_code: String,
    pub lot_no: String,
    pub license_plate: String,
    /// Path of the park-in snapshot on local disk
    pub lot_in_image_ref: String,
    /// Path of the park-out snapshot on local disk
    pub lot_out_image_ref: String,
    pub lot_in_time: String,
    pub lot_out_time: String,
    pub sent_in_time: String,
    pub sent_out_time: String,
}

impl ParkingLotEvent {
    pub fn new(location_code: &str, lot_no: &str, license_plate: &str) -> Self {
        Self {
            location_code: location_code.to_string(),
            lot_no: lot_no.to_string(),
            license_plate: license_plate.to_string(),
            ..Default::default()
        }
    }

    pub fn with_lot_in(mut self, image_ref: &str, time: &str) -> Self {
        self.lot_in_image_ref = image_ref.to_string();
        self.lot_in_time = time.to_string();
        self
    }

    pub fn with_lot_out(mut self, image_ref: &str, time: &str) -> Self {
        self.lot_out_image_ref = image_ref.to_string();
        self.lot_out_time = time.to_string();
        self
    }

    /// True if this event describes a vehicle leaving the lot
    pub fn is_park_out(&self) -> bool {
        !self.lot_out_time.is_empty()
    }
}

impl fmt::Display for ParkingLotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lot={} lpn={}", self.lot_no, self.license_plate)
    }
}

/// Map an empty string to `None`
#[inline]
pub fn nullable(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Device status reported to central in `/DeviceStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceStatusCode {
    #[default]
    Recovered = 0,
    CameraFault = 1,
    IpcFault = 2,
}

impl DeviceStatusCode {
    /// Wire representation ("0", "1", "2")
    pub fn as_code(&self) -> &'static str {
        match self {
            DeviceStatusCode::Recovered => "0",
            DeviceStatusCode::CameraFault => "1",
            DeviceStatusCode::IpcFault => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(DeviceStatusCode::Recovered),
            "1" => Some(DeviceStatusCode::CameraFault),
            "2" => Some(DeviceStatusCode::IpcFault),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl Serialize for DeviceStatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_code())
    }
}

/// One of the three concurrently tracked debounce windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterSlot {
    First,
    Second,
    Third,
}

impl FilterSlot {
    pub const ALL: [FilterSlot; 3] = [FilterSlot::First, FilterSlot::Second, FilterSlot::Third];

    pub fn index(&self) -> usize {
        match self {
            FilterSlot::First => 0,
            FilterSlot::Second => 1,
            FilterSlot::Third => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterSlot::First => "first",
            FilterSlot::Second => "second",
            FilterSlot::Third => "third",
        }
    }
}

impl fmt::Display for FilterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
