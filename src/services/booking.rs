//! Сервисный слой бронирования: чистые проверки границ зала и повторов в
//! пакете, трейт хранилища `BookingStore` (боевая реализация - Postgres,
//! в тестах - in-memory) и `BookingService`, который собирает заказ.
//! Заказ пишется атомарно - либо целиком со всеми билетами, либо никак.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{is_foreign_key_violation, is_unique_violation};
use crate::models::{Order, Ticket};

/// Заявка на один билет из тела запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct TicketSpec {
    pub movie_session: i64,
    pub row: i32,
    pub seat: i32,
}

/// Геометрия зала, в котором идёт сеанс.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct HallLayout {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl HallLayout {
    pub fn capacity(&self) -> i64 {
        self.rows as i64 * self.seats_in_row as i64
    }
}

/// Занятое место в зале.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Place {
    pub row: i32,
    pub seat: i32,
}

/// Результат успешно записанного заказа.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

/// Вердикт по одному билету. Тексты уходят клиенту без изменений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("row must be in range [1, {max_rows}], not {row}")]
    RowOutOfRange { row: i32, max_rows: i32 },

    #[error("seat must be in range[1, {max_seats}], not {seat}")]
    SeatOutOfRange { seat: i32, max_seats: i32 },

    #[error("Seat {seat} in row {row} for movie session is already taken.")]
    SeatTaken {
        movie_session: i64,
        row: i32,
        seat: i32,
    },

    #[error("Duplicate ticket for movie_session={movie_session}, row={row}, seat={seat}")]
    DuplicateInBatch {
        movie_session: i64,
        row: i32,
        seat: i32,
    },

    #[error("movie session {0} does not exist")]
    UnknownSession(i64),
}

/// Ошибка создания заказа целиком.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order must contain at least one ticket")]
    EmptyOrder,

    /// Ошибка конкретного билета вместе с его позицией в запросе.
    #[error("tickets[{index}]: {reason}")]
    Ticket { index: usize, reason: BookingError },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Проверка границ ряда.
pub fn validate_row(row: i32, max_rows: i32) -> Result<(), BookingError> {
    if (1..=max_rows).contains(&row) {
        Ok(())
    } else {
        Err(BookingError::RowOutOfRange { row, max_rows })
    }
}

/// Проверка границ места в ряду.
pub fn validate_seat(seat: i32, max_seats: i32) -> Result<(), BookingError> {
    if (1..=max_seats).contains(&seat) {
        Ok(())
    } else {
        Err(BookingError::SeatOutOfRange { seat, max_seats })
    }
}

/// Ищет повтор (сеанс, ряд, место) внутри одного пакета.
/// Возвращает индекс элемента, повторившего более ранний.
pub fn find_batch_duplicate(specs: &[TicketSpec]) -> Option<usize> {
    let mut seen = HashSet::with_capacity(specs.len());
    specs
        .iter()
        .position(|spec| !seen.insert((spec.movie_session, spec.row, spec.seat)))
}

/// Доступ к состоянию бронирования.
///
/// Вынесен в трейт, чтобы логику заказа можно было гонять в тестах
/// без поднятого Postgres.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Геометрия зала сеанса. None - сеанса не существует.
    async fn hall_for_session(&self, movie_session: i64) -> anyhow::Result<Option<HallLayout>>;

    /// Занято ли уже конкретное место на сеансе.
    async fn ticket_exists(&self, movie_session: i64, row: i32, seat: i32)
        -> anyhow::Result<bool>;

    /// Сколько билетов уже продано на сеанс.
    async fn tickets_sold(&self, movie_session: i64) -> anyhow::Result<i64>;

    /// Все занятые места сеанса, по ряду и месту.
    async fn taken_places(&self, movie_session: i64) -> anyhow::Result<Vec<Place>>;

    /// Записывает заказ и все его билеты одной транзакцией.
    async fn insert_order(
        &self,
        user_id: i32,
        specs: &[TicketSpec],
    ) -> Result<CreatedOrder, OrderError>;
}

/// Боевая реализация поверх Postgres.
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn hall_for_session(&self, movie_session: i64) -> anyhow::Result<Option<HallLayout>> {
        let layout = sqlx::query_as::<_, HallLayout>(
            "SELECT h.rows, h.seats_in_row
             FROM movie_sessions ms
             JOIN cinema_halls h ON h.id = ms.cinema_hall_id
             WHERE ms.id = $1",
        )
        .bind(movie_session)
        .fetch_optional(&self.pool)
        .await?;

        Ok(layout)
    }

    async fn ticket_exists(
        &self,
        movie_session: i64,
        row: i32,
        seat: i32,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM tickets
                 WHERE movie_session_id = $1 AND row = $2 AND seat = $3
             )",
        )
        .bind(movie_session)
        .bind(row)
        .bind(seat)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn tickets_sold(&self, movie_session: i64) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE movie_session_id = $1")
                .bind(movie_session)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn taken_places(&self, movie_session: i64) -> anyhow::Result<Vec<Place>> {
        let places = sqlx::query_as::<_, Place>(
            "SELECT row, seat FROM tickets WHERE movie_session_id = $1 ORDER BY row, seat",
        )
        .bind(movie_session)
        .fetch_all(&self.pool)
        .await?;

        Ok(places)
    }

    async fn insert_order(
        &self,
        user_id: i32,
        specs: &[TicketSpec],
    ) -> Result<CreatedOrder, OrderError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OrderError::Storage(e.into()))?;

        let order: Order = sqlx::query_as(
            "INSERT INTO orders (user_id) VALUES ($1) RETURNING id, user_id, created_at",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| OrderError::Storage(e.into()))?;

        let mut tickets = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let ticket: Ticket = sqlx::query_as(
                "INSERT INTO tickets (order_id, movie_session_id, row, seat)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, order_id, movie_session_id, row, seat",
            )
            .bind(order.id)
            .bind(spec.movie_session)
            .bind(spec.row)
            .bind(spec.seat)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| ticket_insert_error(index, spec, err))?;

            tickets.push(ticket);
        }

        // При раннем выходе транзакция откатывается на drop
        tx.commit()
            .await
            .map_err(|e| OrderError::Storage(e.into()))?;

        Ok(CreatedOrder { order, tickets })
    }
}

/// Переводит ошибку вставки билета в доменную. Нарушение уникальности значит,
/// что место успели занять между проверкой и коммитом.
fn ticket_insert_error(index: usize, spec: &TicketSpec, err: sqlx::Error) -> OrderError {
    if is_unique_violation(&err) {
        return OrderError::Ticket {
            index,
            reason: BookingError::SeatTaken {
                movie_session: spec.movie_session,
                row: spec.row,
                seat: spec.seat,
            },
        };
    }

    if is_foreign_key_violation(&err) {
        return OrderError::Ticket {
            index,
            reason: BookingError::UnknownSession(spec.movie_session),
        };
    }

    OrderError::Storage(err.into())
}

/// Связывает чистые проверки с хранилищем.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Прямой доступ к хранилищу для проекций сеанса.
    pub fn store(&self) -> &dyn BookingStore {
        self.store.as_ref()
    }

    /// Проверяет один билет по текущему состоянию хранилища.
    ///
    /// Внешний Result - сбой хранилища, внутренний - вердикт по билету.
    /// Порядок правил фиксирован: ряд, затем место, затем занятость.
    pub async fn validate(&self, spec: &TicketSpec) -> anyhow::Result<Result<(), BookingError>> {
        let hall = match self.store.hall_for_session(spec.movie_session).await? {
            Some(hall) => hall,
            None => return Ok(Err(BookingError::UnknownSession(spec.movie_session))),
        };

        if let Err(err) = validate_row(spec.row, hall.rows) {
            return Ok(Err(err));
        }

        if let Err(err) = validate_seat(spec.seat, hall.seats_in_row) {
            return Ok(Err(err));
        }

        if self
            .store
            .ticket_exists(spec.movie_session, spec.row, spec.seat)
            .await?
        {
            return Ok(Err(BookingError::SeatTaken {
                movie_session: spec.movie_session,
                row: spec.row,
                seat: spec.seat,
            }));
        }

        Ok(Ok(()))
    }

    /// Создаёт заказ с билетами. Либо записан весь заказ, либо ничего.
    ///
    /// Предварительные проверки отсекают заведомо плохие запросы, но гонку
    /// двух одновременных заказов на одно место решает уникальный индекс:
    /// его срабатывание на коммите тоже превращается в SeatTaken.
    pub async fn create_order(
        &self,
        user_id: i32,
        specs: &[TicketSpec],
    ) -> Result<CreatedOrder, OrderError> {
        if specs.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        if let Some(index) = find_batch_duplicate(specs) {
            let spec = specs[index];
            return Err(OrderError::Ticket {
                index,
                reason: BookingError::DuplicateInBatch {
                    movie_session: spec.movie_session,
                    row: spec.row,
                    seat: spec.seat,
                },
            });
        }

        for (index, spec) in specs.iter().enumerate() {
            if let Err(reason) = self.validate(spec).await? {
                return Err(OrderError::Ticket { index, reason });
            }
        }

        self.store.insert_order(user_id, specs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spec(movie_session: i64, row: i32, seat: i32) -> TicketSpec {
        TicketSpec {
            movie_session,
            row,
            seat,
        }
    }

    #[test]
    fn row_inside_bounds_passes() {
        assert!(validate_row(1, 5).is_ok());
        assert!(validate_row(5, 5).is_ok());
    }

    #[test]
    fn row_outside_bounds_fails() {
        assert_eq!(
            validate_row(6, 5),
            Err(BookingError::RowOutOfRange { row: 6, max_rows: 5 })
        );
        assert_eq!(
            validate_row(0, 5),
            Err(BookingError::RowOutOfRange { row: 0, max_rows: 5 })
        );
    }

    #[test]
    fn seat_bounds_are_inclusive() {
        assert!(validate_seat(10, 10).is_ok());
        assert_eq!(
            validate_seat(11, 10),
            Err(BookingError::SeatOutOfRange {
                seat: 11,
                max_seats: 10
            })
        );
    }

    #[test]
    fn duplicate_scan_reports_second_occurrence() {
        let specs = [spec(1, 1, 1), spec(1, 2, 2), spec(1, 1, 1)];
        assert_eq!(find_batch_duplicate(&specs), Some(2));
    }

    #[test]
    fn duplicate_scan_ignores_distinct_places() {
        let specs = [spec(1, 1, 1), spec(1, 1, 2), spec(2, 1, 1)];
        assert_eq!(find_batch_duplicate(&specs), None);
    }

    #[test]
    fn ticket_spec_parses_request_body_shape() {
        let spec: TicketSpec =
            serde_json::from_str(r#"{"movie_session": 5, "row": 3, "seat": 7}"#).unwrap();
        assert_eq!(
            spec,
            TicketSpec {
                movie_session: 5,
                row: 3,
                seat: 7
            }
        );
    }

    #[test]
    fn hall_capacity_is_rows_times_seats() {
        let hall = HallLayout {
            rows: 10,
            seats_in_row: 10,
        };
        assert_eq!(hall.capacity(), 100);
    }

    #[test]
    fn capacity_of_oversized_hall_is_exact() {
        // Произведение размеров не обязано влезать в i32
        let hall = HallLayout {
            rows: 46_341,
            seats_in_row: 46_341,
        };
        assert_eq!(hall.capacity(), 2_147_488_281);
    }

    #[test]
    fn error_messages_match_client_text() {
        let err = BookingError::RowOutOfRange { row: 6, max_rows: 5 };
        assert_eq!(err.to_string(), "row must be in range [1, 5], not 6");

        let err = BookingError::SeatOutOfRange {
            seat: 12,
            max_seats: 10,
        };
        assert_eq!(err.to_string(), "seat must be in range[1, 10], not 12");

        let err = BookingError::SeatTaken {
            movie_session: 3,
            row: 2,
            seat: 9,
        };
        assert_eq!(
            err.to_string(),
            "Seat 9 in row 2 for movie session is already taken."
        );

        let err = BookingError::DuplicateInBatch {
            movie_session: 5,
            row: 1,
            seat: 1,
        };
        assert_eq!(
            err.to_string(),
            "Duplicate ticket for movie_session=5, row=1, seat=1"
        );
    }

    #[test]
    fn order_error_carries_ticket_index() {
        let err = OrderError::Ticket {
            index: 2,
            reason: BookingError::RowOutOfRange { row: 9, max_rows: 5 },
        };
        assert_eq!(err.to_string(), "tickets[2]: row must be in range [1, 5], not 9");
    }

    proptest! {
        #[test]
        fn place_accepted_iff_inside_hall(row in -5i32..20, seat in -5i32..30) {
            let hall = HallLayout { rows: 9, seats_in_row: 18 };
            let accepted = validate_row(row, hall.rows).is_ok()
                && validate_seat(seat, hall.seats_in_row).is_ok();
            let inside = (1..=hall.rows).contains(&row)
                && (1..=hall.seats_in_row).contains(&seat);
            prop_assert_eq!(accepted, inside);
        }
    }
}
