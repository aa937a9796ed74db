use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounded parcel store: memory stays fixed no matter how many parcels an
/// operator queues.
pub const MAX_PARCELS: usize = 256;
/// Broadcast snapshots carry only the most recent parcels.
pub const PARCEL_SNAPSHOT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParcelStatus {
    #[default]
    Queued,
    Loaded,
    Shipped,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    pub weight_kg: f64,
    pub destination_km: f64,
    #[serde(default)]
    pub status: ParcelStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("warehouse is at capacity")]
    Full,
}

/// The seam the simulator loads payload through. Only the weight crosses
/// the boundary; parcel identity and destination stay in the warehouse.
pub trait ParcelSource {
    /// Marks the first QUEUED parcel LOADED and returns its weight, or
    /// `None` when nothing is queued.
    fn take_first_queued(&mut self) -> Option<f64>;
}

/// Plain ordered parcel catalog, newest first.
#[derive(Debug, Default)]
pub struct Warehouse {
    parcels: Vec<Parcel, MAX_PARCELS>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self { parcels: Vec::new() }
    }

    /// Inserts a parcel at the front of the catalog.
    pub fn insert_new(&mut self, parcel: Parcel) -> Result<(), WarehouseError> {
        self.parcels
            .insert(0, parcel)
            .map_err(|_| WarehouseError::Full)
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    /// The most recent parcels, in catalog order, for a parcels envelope.
    pub fn snapshot(&self) -> std::vec::Vec<Parcel> {
        self.parcels
            .iter()
            .take(PARCEL_SNAPSHOT_LIMIT)
            .cloned()
            .collect()
    }
}

impl ParcelSource for Warehouse {
    fn take_first_queued(&mut self) -> Option<f64> {
        let parcel = self
            .parcels
            .iter_mut()
            .find(|p| p.status == ParcelStatus::Queued)?;
        parcel.status = ParcelStatus::Loaded;
        Some(parcel.weight_kg)
    }
}
