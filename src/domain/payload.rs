//! JSON bodies for the central backend endpoints
//!
//! Field order of each payload struct is the wire order.

use crate::domain::types::{nullable, DeviceStatusCode};
use serde::Serialize;
use std::fmt;

/// Message sent with every heartbeat
pub const HEARTBEAT_MSG: &str = "Heartbeat Update";

/// Central backend endpoints, one long-lived client session each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    HeartBeat,
    DeviceStatus,
    ParkInOut,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::HeartBeat, Endpoint::DeviceStatus, Endpoint::ParkInOut];

    /// Request target on the central server
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::HeartBeat => "/HeartBeat",
            Endpoint::DeviceStatus => "/DeviceStatus",
            Endpoint::ParkInOut => "/ParkInOut",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.path() == path)
    }

    pub fn index(&self) -> usize {
        match self {
            Endpoint::HeartBeat => 0,
            Endpoint::DeviceStatus => 1,
            Endpoint::ParkInOut => 2,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Static credentials carried in every outbound body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self { username: "testuser".to_string(), password: "testpassword".to_string() }
    }
}

/// Body of `POST /HeartBeat`
#[derive(Debug, Serialize)]
pub struct HeartbeatPayload<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub carpark_code: &'a str,
    pub heartbeat_dt: &'a str,
    pub msg: &'a str,
}

impl<'a> HeartbeatPayload<'a> {
    pub fn new(credentials: &'a Credentials, carpark_code: &'a str, heartbeat_dt: &'a str) -> Self {
        Self {
            username: &credentials.username,
            password: &credentials.password,
            carpark_code,
            heartbeat_dt,
            msg: HEARTBEAT_MSG,
        }
    }
}

/// Body of `POST /DeviceStatus`
#[derive(Debug, Serialize)]
pub struct DeviceStatusPayload<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub carpark_code: &'a str,
    pub device_ip: &'a str,
    pub error_code: DeviceStatusCode,
}

impl<'a> DeviceStatusPayload<'a> {
    pub fn new(
        credentials: &'a Credentials,
        carpark_code: &'a str,
        device_ip: &'a str,
        error_code: DeviceStatusCode,
    ) -> Self {
        Self {
            username: &credentials.username,
            password: &credentials.password,
            carpark_code,
            device_ip,
            error_code,
        }
    }
}

/// Body of `POST /ParkInOut`
///
/// Image fields carry base64 content, or an empty string when there is no
/// snapshot. Other unset fields are sent as `null`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParkInOutPayload<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub carpark_code: &'a str,
    pub lot_no: Option<&'a str>,
    pub lpn: Option<&'a str>,
    pub lot_in_image: &'a str,
    pub lot_out_image: &'a str,
    pub lot_in_time: Option<&'a str>,
    pub lot_out_time: Option<&'a str>,
}

/// Park event fields after image refs have been resolved to content
#[derive(Debug, Clone, Default)]
pub struct ParkInOutFields {
    pub lot_no: String,
    pub lpn: String,
    pub lot_in_image: String,
    pub lot_out_image: String,
    pub lot_in_time: String,
    pub lot_out_time: String,
}

impl<'a> ParkInOutPayload<'a> {
    pub fn new(credentials: &'a Credentials, carpark_code: &'a str, fields: &'a ParkInOutFields) -> Self {
        Self {
            username: &credentials.username,
            password: &credentials.password,
            carpark_code,
            lot_no: nullable(&fields.lot_no),
            lpn: nullable(&fields.lpn),
            lot_in_image: &fields.lot_in_image,
            lot_out_image: &fields.lot_out_image,
            lot_in_time: nullable(&fields.lot_in_time),
            lot_out_time: nullable(&fields.lot_out_time),
        }
    }

    /// Copy of this payload safe to log: image content replaced by markers
    pub fn redacted(&self) -> ParkInOutPayload<'a> {
        ParkInOutPayload {
            lot_in_image: if self.lot_in_image.is_empty() { "Empty" } else { "Lot In Image" },
            lot_out_image: if self.lot_out_image.is_empty() { "Empty" } else { "Lot Out Image" },
            ..*self
        }
    }
}
