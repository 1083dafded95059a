use async_trait::async_trait;

use crate::models::{Location, StayId};

/// Resolves a stay's street address to coordinates
#[async_trait]
pub trait GeoCoder: Send + Sync {
    async fn lat_lng(&self, stay_id: StayId, address: &str) -> Result<Location, GeoCodingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeoCodingError {
    #[error("Address could not be resolved: {0}")]
    Unresolved(String),
}

/// Answers every non-blank address with the same coordinate
pub struct MockGeoCoder {
    pub lat: f64,
    pub lon: f64,
}

impl Default for MockGeoCoder {
    fn default() -> Self {
        Self { lat: 47.6062, lon: -122.3321 }
    }
}

#[async_trait]
impl GeoCoder for MockGeoCoder {
    async fn lat_lng(&self, stay_id: StayId, address: &str) -> Result<Location, GeoCodingError> {
        if address.trim().is_empty() {
            return Err(GeoCodingError::Unresolved("blank address".to_string()));
        }
        Ok(Location { stay_id, lat: self.lat, lon: self.lon })
    }
}
