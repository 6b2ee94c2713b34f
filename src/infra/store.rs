//! Storage collaborator for parking lot status and transaction rows
//!
//! The hub only needs insert/count/clear/last-id. `MemoryStore` keeps rows
//! in-process; a database-backed store implements the same trait.

use crate::domain::types::{nullable, DeviceStatusCode, ParkingLotEvent};
use parking_lot::Mutex;
use tracing::debug;

/// A device status row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: u64,
    pub carpark_code: String,
    pub device_ip: Option<String>,
    pub error_code: DeviceStatusCode,
}

/// A park-in / park-out transaction row. Empty event fields are stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub id: u64,
    pub location_code: Option<String>,
    pub lot_no: Option<String>,
    pub lpn: Option<String>,
    pub lot_in_image_path: Option<String>,
    pub lot_out_image_path: Option<String>,
    pub lot_in_dt: Option<String>,
    pub lot_out_dt: Option<String>,
    pub lot_in_central_sent_dt: Option<String>,
    pub lot_out_central_sent_dt: Option<String>,
}

fn owned(value: &str) -> Option<String> {
    nullable(value).map(str::to_string)
}

impl TransactionRow {
    fn from_event(id: u64, event: &ParkingLotEvent) -> Self {
        Self {
            id,
            location_code: owned(&event.location_code),
            lot_no: owned(&event.lot_no),
            lpn: owned(&event.license_plate),
            lot_in_image_path: owned(&event.lot_in_image_ref),
            lot_out_image_path: owned(&event.lot_out_image_ref),
            lot_in_dt: owned(&event.lot_in_time),
            lot_out_dt: owned(&event.lot_out_time),
            lot_in_central_sent_dt: owned(&event.sent_in_time),
            lot_out_central_sent_dt: owned(&event.sent_out_time),
        }
    }
}

/// Persistent storage used when central is unreachable
pub trait LotStore: Send + Sync {
    fn insert_status(&self, carpark_code: &str, device_ip: &str, error_code: DeviceStatusCode) -> bool;
    fn insert_transaction(&self, event: &ParkingLotEvent) -> bool;
    fn status_count(&self) -> usize;
    fn transaction_count(&self) -> usize;
    fn clear_status(&self) -> bool;
    fn clear_transactions(&self) -> bool;
    /// Id of the last inserted status row, if any
    fn last_status_id(&self) -> Option<u64>;
    /// Id of the last inserted transaction row, if any
    fn last_transaction_id(&self) -> Option<u64>;
}

#[derive(Default)]
struct Tables {
    status: Vec<StatusRow>,
    transactions: Vec<TransactionRow>,
    next_status_id: u64,
    next_transaction_id: u64,
}

/// In-process store. Ids keep increasing across clears, like auto-increment.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_rows(&self) -> Vec<StatusRow> {
        self.tables.lock().status.clone()
    }

    pub fn transaction_rows(&self) -> Vec<TransactionRow> {
        self.tables.lock().transactions.clone()
    }
}

impl LotStore for MemoryStore {
    fn insert_status(&self, carpark_code: &str, device_ip: &str, error_code: DeviceStatusCode) -> bool {
        let mut tables = self.tables.lock();
        tables.next_status_id += 1;
        let id = tables.next_status_id;
        tables.status.push(StatusRow {
            id,
            carpark_code: carpark_code.to_string(),
            device_ip: owned(device_ip),
            error_code,
        });
        debug!(id = id, error_code = %error_code, "store_status_inserted");
        true
    }

    fn insert_transaction(&self, event: &ParkingLotEvent) -> bool {
        let mut tables = self.tables.lock();
        tables.next_transaction_id += 1;
        let id = tables.next_transaction_id;
        tables.transactions.push(TransactionRow::from_event(id, event));
        debug!(id = id, lot_no = %event.lot_no, "store_transaction_inserted");
        true
    }

    fn status_count(&self) -> usize {
        self.tables.lock().status.len()
    }

    fn transaction_count(&self) -> usize {
        self.tables.lock().transactions.len()
    }

    fn clear_status(&self) -> bool {
        self.tables.lock().status.clear();
        true
    }

    fn clear_transactions(&self) -> bool {
        self.tables.lock().transactions.clear();
        true
    }

    fn last_status_id(&self) -> Option<u64> {
        self.tables.lock().status.last().map(|r| r.id)
    }

    fn last_transaction_id(&self) -> Option<u64> {
        self.tables.lock().transactions.last().map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_insert_count_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.last_status_id(), None);

        assert!(store.insert_status("CP01", "10.0.0.5", DeviceStatusCode::CameraFault));
        assert!(store.insert_status("CP01", "10.0.0.5", DeviceStatusCode::Recovered));
        assert_eq!(store.status_count(), 2);
        assert_eq!(store.last_status_id(), Some(2));

        assert!(store.clear_status());
        assert_eq!(store.status_count(), 0);

        // Ids are not reused after a clear
        store.insert_status("CP01", "", DeviceStatusCode::IpcFault);
        assert_eq!(store.last_status_id(), Some(3));
        assert_eq!(store.status_rows()[0].device_ip, None);
    }

    #[test]
    fn test_transaction_empty_fields_are_none() {
        let store = MemoryStore::new();
        store.insert_transaction(&ParkingLotEvent::default());

        let row = &store.transaction_rows()[0];
        assert_eq!(row.id, 1);
        assert_eq!(row.lot_no, None);
        assert_eq!(row.lpn, None);
        assert_eq!(row.lot_in_dt, None);
    }

    #[test]
    fn test_transaction_fields_are_kept() {
        let store = MemoryStore::new();
        let event = ParkingLotEvent::new("CP01", "165", "SNN 4019 G")
            .with_lot_in("/tmp/in.jpg", "2024-04-11 21:32:51");
        store.insert_transaction(&event);

        let row = &store.transaction_rows()[0];
        assert_eq!(row.location_code.as_deref(), Some("CP01"));
        assert_eq!(row.lpn.as_deref(), Some("SNN 4019 G"));
        assert_eq!(row.lot_in_image_path.as_deref(), Some("/tmp/in.jpg"));
        assert_eq!(row.lot_out_dt, None);
        assert_eq!(store.transaction_count(), 1);

        store.clear_transactions();
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.last_transaction_id(), None);
    }
}
