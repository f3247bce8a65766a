use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use boxoffice_core::models::{Booking, BookingStatus, Seat, SeatStatistics, SeatStatus, Show};
use boxoffice_core::repository::{ReservationStore, ReservationTx, StoreError, StoreResult};

const SHOW_COLUMNS: &str = "id, show_time, total_seats, created_at, updated_at";
const SEAT_COLUMNS: &str =
    "id, show_id, seat_number, status, held_by, hold_expires_at, created_at, updated_at";
const BOOKING_COLUMNS: &str = "id, show_id, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowRow {
    id: i64,
    show_time: DateTime<Utc>,
    total_seats: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShowRow> for Show {
    fn from(row: ShowRow) -> Self {
        Show {
            id: row.id,
            show_time: row.show_time,
            total_seats: row.total_seats,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    show_id: i64,
    seat_number: i32,
    status: String,
    held_by: Option<i64>,
    hold_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = StoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            id: row.id,
            show_id: row.show_id,
            seat_number: row.seat_number,
            status: row.status.parse()?,
            held_by: row.held_by,
            hold_expires_at: row.hold_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    show_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            show_id: row.show_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn seats(rows: Vec<SeatRow>) -> StoreResult<Vec<Seat>> {
    rows.into_iter().map(Seat::try_from).collect()
}

fn bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    type Tx = PgReservationTx;

    async fn begin(&self) -> StoreResult<PgReservationTx> {
        let tx = self.pool.begin().await.map_err(StoreError::backend)?;
        Ok(PgReservationTx { tx })
    }

    async fn find_show(&self, show_id: i64) -> StoreResult<Option<Show>> {
        let row = sqlx::query_as::<_, ShowRow>(&format!(
            "SELECT {SHOW_COLUMNS} FROM shows WHERE id = $1"
        ))
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(row.map(Show::from))
    }

    async fn find_booking(&self, booking_id: i64) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(Booking::try_from).transpose()
    }

    async fn seats_for_show(&self, show_id: i64) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE show_id = $1 ORDER BY seat_number ASC"
        ))
        .bind(show_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        seats(rows)
    }

    async fn seats_for_booking(&self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE held_by = $1 ORDER BY seat_number ASC"
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        seats(rows)
    }

    async fn seat_statistics(&self, show_id: i64) -> StoreResult<SeatStatistics> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(id) AS count
            FROM seats
            WHERE show_id = $1
            GROUP BY status
            "#,
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let mut stats = SeatStatistics::default();
        for (status, count) in rows {
            stats.record(status.parse::<SeatStatus>()?, count);
        }
        Ok(stats)
    }

    async fn bookings_for_show(
        &self,
        show_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings b
            WHERE b.show_id = $1
              AND ($2::TEXT IS NULL OR b.status = $2)
              AND EXISTS (SELECT 1 FROM seats s WHERE s.held_by = b.id)
            ORDER BY b.id ASC
            "#
        ))
        .bind(show_id)
        .bind(status.map(BookingStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        bookings(rows)
    }
}

/// One Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn insert_show(
        &mut self,
        show_time: DateTime<Utc>,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Show> {
        let row = sqlx::query_as::<_, ShowRow>(&format!(
            r#"
            INSERT INTO shows (show_time, total_seats, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING {SHOW_COLUMNS}
            "#
        ))
        .bind(show_time)
        .bind(total_seats)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(row.into())
    }

    async fn insert_seats(
        &mut self,
        show_id: i64,
        total_seats: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO seats (show_id, seat_number, status, created_at, updated_at)
            SELECT $1, n, 'AVAILABLE', $3, $3 FROM generate_series(1, $2) AS n
            "#,
        )
        .bind(show_id)
        .bind(total_seats)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn insert_pending_booking(
        &mut self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO bookings (show_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(show_id)
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        row.try_into()
    }

    async fn delete_booking(&mut self, booking_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn lock_booking(&mut self, booking_id: i64) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        row.map(Booking::try_from).transpose()
    }

    async fn set_booking_status(
        &mut self,
        booking_id: i64,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(now)
            .bind(booking_id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn hold_available_seats(
        &mut self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'HELD', held_by = $1, hold_expires_at = $2, updated_at = $3
            WHERE show_id = $4 AND id = ANY($5) AND status = 'AVAILABLE'
            "#,
        )
        .bind(booking_id)
        .bind(expires_at)
        .bind(now)
        .bind(show_id)
        .bind(seat_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn lock_held_seats(&mut self, booking_id: i64) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            r#"
            SELECT {SEAT_COLUMNS} FROM seats
            WHERE held_by = $1 AND status = 'HELD'
            ORDER BY id
            FOR UPDATE
            "#
        ))
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        seats(rows)
    }

    async fn book_held_seats(&mut self, booking_id: i64, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'BOOKED', hold_expires_at = NULL, updated_at = $2
            WHERE held_by = $1 AND status = 'HELD'
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn release_held_seats(
        &mut self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL, updated_at = $2
            WHERE held_by = $1 AND status = 'HELD'
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn lock_expired_holds(
        &mut self,
        now: DateTime<Utc>,
        show_id: Option<i64>,
    ) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            r#"
            SELECT {SEAT_COLUMNS} FROM seats
            WHERE status = 'HELD'
              AND hold_expires_at < $1
              AND ($2::BIGINT IS NULL OR show_id = $2)
            ORDER BY id
            FOR UPDATE
            "#
        ))
        .bind(now)
        .bind(show_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        seats(rows)
    }

    async fn release_seats(&mut self, seat_ids: &[i64], now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL, updated_at = $2
            WHERE id = ANY($1) AND status = 'HELD'
            "#,
        )
        .bind(seat_ids)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn count_held_seats(&mut self, booking_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE held_by = $1 AND status = 'HELD'")
            .bind(booking_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::backend)
    }

    async fn expire_pending_bookings(
        &mut self,
        booking_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        // Rows locked by an in-flight confirm/cancel are skipped: lock order
        // is booking before seats, and this runs after the seat locks.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'EXPIRED', updated_at = $2
            WHERE id IN (
                SELECT id FROM bookings
                WHERE id = ANY($1) AND status = 'PENDING'
                FOR UPDATE SKIP LOCKED
            )
            "#,
        )
        .bind(booking_ids)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn delete_orphan_bookings(&mut self) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM bookings b
            WHERE b.status = 'PENDING'
              AND NOT EXISTS (SELECT 1 FROM seats s WHERE s.held_by = b.id)
            "#,
        )
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(StoreError::backend)
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await.map_err(StoreError::backend)
    }
}
