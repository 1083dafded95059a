use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use lodge_core::{
    DateRange, LedgerStore, LedgerTx, Location, Reservation, ReservationId, Stay, StayId, StayImage,
    StoreError, StoreResult,
};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Translate a driver error into the ledger's error taxonomy by SQLSTATE.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or_default().to_string();
        match db_err.code().as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                debug!("Postgres aborted transaction: {}", db_err.message());
                return StoreError::SerializationFailure;
            }
            Some(UNIQUE_VIOLATION) => return StoreError::UniqueViolation(constraint),
            Some(FOREIGN_KEY_VIOLATION) => return StoreError::ForeignKeyViolation(constraint),
            _ => {}
        }
    }
    StoreError::Backend(err.to_string())
}

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin_serializable(&self) -> StoreResult<PgLedgerTx> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Must be the first statement of the transaction
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(PgLedgerTx { tx })
    }
}

/// A SERIALIZABLE Postgres transaction; rolled back by sqlx when dropped
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct StayRow {
    id: Uuid,
    host: String,
    name: String,
    description: Option<String>,
    address: String,
    guest_number: i32,
    created_at: DateTime<Utc>,
}

impl StayRow {
    fn into_stay(self, images: Vec<String>) -> Stay {
        Stay {
            id: StayId(self.id),
            host: self.host,
            name: self.name,
            description: self.description,
            address: self.address,
            guest_number: self.guest_number,
            images: images.into_iter().map(|url| StayImage { url }).collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    stay_id: Uuid,
    guest: String,
    checkin_date: NaiveDate,
    checkout_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            id: ReservationId(row.id),
            stay_id: StayId(row.stay_id),
            guest: row.guest,
            check_in: row.checkin_date,
            check_out: row.checkout_date,
            created_at: row.created_at,
        }
    }
}

const RESERVATION_COLUMNS: &str = "id, stay_id, guest, checkin_date, checkout_date, created_at";

impl PgLedgerTx {
    async fn stay_images(&mut self, stay_id: Uuid) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT url FROM stay_images WHERE stay_id = $1 ORDER BY position")
            .bind(stay_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_stay(&mut self, stay_id: StayId) -> StoreResult<Option<Stay>> {
        let row = sqlx::query_as::<_, StayRow>(
            "SELECT id, host, name, description, address, guest_number, created_at FROM stays WHERE id = $1",
        )
        .bind(stay_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let images = self.stay_images(row.id).await?;
                Ok(Some(row.into_stay(images)))
            }
            None => Ok(None),
        }
    }

    async fn list_stays_by_host(&mut self, host: &str) -> StoreResult<Vec<Stay>> {
        let rows = sqlx::query_as::<_, StayRow>(
            "SELECT id, host, name, description, address, guest_number, created_at FROM stays WHERE host = $1 ORDER BY created_at",
        )
        .bind(host)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut stays = Vec::with_capacity(rows.len());
        for row in rows {
            let images = self.stay_images(row.id).await?;
            stays.push(row.into_stay(images));
        }
        Ok(stays)
    }

    async fn insert_stay(&mut self, stay: &Stay) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stays (id, host, name, description, address, guest_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(stay.id.0)
        .bind(&stay.host)
        .bind(&stay.name)
        .bind(&stay.description)
        .bind(&stay.address)
        .bind(stay.guest_number)
        .bind(stay.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        for (position, image) in stay.images.iter().enumerate() {
            sqlx::query("INSERT INTO stay_images (url, stay_id, position) VALUES ($1, $2, $3)")
                .bind(&image.url)
                .bind(stay.id.0)
                .bind(position as i32)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    async fn save_location(&mut self, location: &Location) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (stay_id, lat, lon) VALUES ($1, $2, $3)
            ON CONFLICT (stay_id) DO UPDATE SET lat = EXCLUDED.lat, lon = EXCLUDED.lon
            "#,
        )
        .bind(location.stay_id.0)
        .bind(location.lat)
        .bind(location.lon)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn reserved_days_in_range(&mut self, stay_id: StayId, range: DateRange) -> StoreResult<Vec<NaiveDate>> {
        sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT date FROM stay_reserved_dates
            WHERE stay_id = $1 AND date >= $2 AND date < $3
            ORDER BY date
            "#,
        )
        .bind(stay_id.0)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, stay_id, guest, checkin_date, checkout_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reservation.id.0)
        .bind(reservation.stay_id.0)
        .bind(&reservation.guest)
        .bind(reservation.check_in)
        .bind(reservation.check_out)
        .bind(reservation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        let dates: Vec<NaiveDate> = reservation.range().days().collect();
        let inserted = sqlx::query(
            r#"
            INSERT INTO stay_reserved_dates (stay_id, date, reservation_id)
            SELECT $1, d, $2 FROM UNNEST($3::date[]) AS d
            "#,
        )
        .bind(reservation.stay_id.0)
        .bind(reservation.id.0)
        .bind(&dates)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if inserted.rows_affected() != dates.len() as u64 {
            return Err(StoreError::Backend(format!(
                "expected {} reserved dates, inserted {}",
                dates.len(),
                inserted.rows_affected()
            )));
        }
        Ok(())
    }

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Reservation::from))
    }

    async fn find_active_reservations(&mut self, stay_id: StayId, as_of: NaiveDate) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE stay_id = $1 AND checkout_date > $2 ORDER BY checkin_date, created_at",
            RESERVATION_COLUMNS
        ))
        .bind(stay_id.0)
        .bind(as_of)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    async fn list_reservations_by_guest(&mut self, guest: &str) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE guest = $1 ORDER BY checkin_date, created_at",
            RESERVATION_COLUMNS
        ))
        .bind(guest)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<()> {
        // stay_reserved_dates rows go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_stay(&mut self, stay_id: StayId) -> StoreResult<()> {
        sqlx::query("DELETE FROM stays WHERE id = $1")
            .bind(stay_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
