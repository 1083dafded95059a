use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::info;

use lodge_core::geocoding::GeoCoder;
use lodge_core::identity::Principal;
use lodge_core::media::{ImageStorage, ImageUpload};
use lodge_core::{Clock, LedgerStore, LedgerTx, NewStay, Stay, StayId, StayImage};

use crate::error::{BookingError, BookingResult};
use crate::guard::StayGuard;

/// Listing operations around the booking core
pub struct StayService<S: LedgerStore> {
    store: Arc<S>,
    images: Arc<dyn ImageStorage>,
    geocoder: Arc<dyn GeoCoder>,
    guard: StayGuard<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> StayService<S> {
    pub fn new(
        store: Arc<S>,
        images: Arc<dyn ImageStorage>,
        geocoder: Arc<dyn GeoCoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = StayGuard::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            images,
            geocoder,
            guard,
            clock,
        }
    }

    pub async fn list_by_host(&self, host: &Principal) -> BookingResult<Vec<Stay>> {
        let mut tx = self.store.begin_serializable().await?;
        let stays = tx.list_stays_by_host(&host.username).await?;
        tx.commit().await?;
        Ok(stays)
    }

    pub async fn find_by_id_and_host(&self, stay_id: StayId, host: &Principal) -> BookingResult<Stay> {
        let mut tx = self.store.begin_serializable().await?;
        let stay = tx.find_stay(stay_id).await?;
        tx.commit().await?;

        stay.filter(|s| s.is_owned_by(&host.username))
            .ok_or_else(|| BookingError::NotFound(format!("Stay {} doesn't exist", stay_id)))
    }

    /// Create a listing: upload its images, then persist the stay and its
    /// geocoded location together.
    pub async fn add(&self, host: &Principal, listing: NewStay, uploads: Vec<ImageUpload>) -> BookingResult<Stay> {
        let links = try_join_all(uploads.iter().map(|upload| self.images.save(upload)))
            .await
            .map_err(|e| BookingError::Collaborator(e.to_string()))?;

        let mut stay = Stay::new(host.username.clone(), listing, self.clock.now());
        stay.images = links.into_iter().map(|url| StayImage { url }).collect();

        let mut tx = self.store.begin_serializable().await?;
        tx.insert_stay(&stay).await?;

        let location = self
            .geocoder
            .lat_lng(stay.id, &stay.address)
            .await
            .map_err(|e| BookingError::Collaborator(e.to_string()))?;
        tx.save_location(&location).await?;
        tx.commit().await?;

        info!("Stay {} listed by {} with {} image(s)", stay.id, stay.host, stay.images.len());
        Ok(stay)
    }

    pub async fn delete(&self, stay_id: StayId, host: &Principal) -> BookingResult<()> {
        self.guard.delete(stay_id, host).await
    }
}
