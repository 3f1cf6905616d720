//! Сценарии бронирования против in-memory хранилища.

mod common;

use std::sync::Arc;

use cinema_api::services::{BookingError, BookingService, OrderError, Place, TicketSpec};
use common::MemoryStore;

fn spec(movie_session: i64, row: i32, seat: i32) -> TicketSpec {
    TicketSpec {
        movie_session,
        row,
        seat,
    }
}

fn service(store: MemoryStore) -> (BookingService, Arc<MemoryStore>) {
    let store = Arc::new(store);
    (BookingService::new(store.clone()), store)
}

#[tokio::test]
async fn booking_same_place_twice_is_rejected() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let created = service.create_order(7, &[spec(1, 3, 7)]).await.unwrap();
    assert_eq!(created.tickets.len(), 1);
    assert_eq!(created.tickets[0].row, 3);
    assert_eq!(created.tickets[0].seat, 7);

    let err = service.create_order(8, &[spec(1, 3, 7)]).await.unwrap_err();
    match err {
        OrderError::Ticket { index, reason } => {
            assert_eq!(index, 0);
            assert_eq!(
                reason,
                BookingError::SeatTaken {
                    movie_session: 1,
                    row: 3,
                    seat: 7
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 1);
    assert_eq!(store.ticket_count(), 1);
}

#[tokio::test]
async fn row_outside_hall_is_rejected() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let err = service.create_order(7, &[spec(1, 6, 1)]).await.unwrap_err();
    match err {
        OrderError::Ticket { index: 0, reason } => {
            assert_eq!(reason, BookingError::RowOutOfRange { row: 6, max_rows: 5 });
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 0);
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn row_check_runs_before_seat_check() {
    let (service, _store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let err = service
        .create_order(7, &[spec(1, 99, 99)])
        .await
        .unwrap_err();
    match err {
        OrderError::Ticket { reason, .. } => {
            assert_eq!(
                reason,
                BookingError::RowOutOfRange {
                    row: 99,
                    max_rows: 5
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn duplicate_specs_in_one_order_are_rejected() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let err = service
        .create_order(7, &[spec(1, 1, 1), spec(1, 1, 1)])
        .await
        .unwrap_err();
    match err {
        OrderError::Ticket { index, reason } => {
            assert_eq!(index, 1);
            assert_eq!(
                reason,
                BookingError::DuplicateInBatch {
                    movie_session: 1,
                    row: 1,
                    seat: 1
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 0);
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn failing_ticket_keeps_whole_order_out() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    // Первый билет валиден, второй выпадает за границы ряда
    let err = service
        .create_order(7, &[spec(1, 2, 2), spec(1, 2, 11)])
        .await
        .unwrap_err();
    match err {
        OrderError::Ticket { index, reason } => {
            assert_eq!(index, 1);
            assert_eq!(
                reason,
                BookingError::SeatOutOfRange {
                    seat: 11,
                    max_seats: 10
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 0);
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let err = service.create_order(7, &[]).await.unwrap_err();
    assert!(matches!(err, OrderError::EmptyOrder));

    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    let err = service.create_order(7, &[spec(42, 1, 1)]).await.unwrap_err();
    match err {
        OrderError::Ticket { index: 0, reason } => {
            assert_eq!(reason, BookingError::UnknownSession(42));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn commit_conflict_surfaces_as_seat_taken() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    // Конкурент занял место после наших проверок, но до коммита
    store.plant_phantom(1, 3, 7);

    let err = service.create_order(7, &[spec(1, 3, 7)]).await.unwrap_err();
    match err {
        OrderError::Ticket { index: 0, reason } => {
            assert_eq!(
                reason,
                BookingError::SeatTaken {
                    movie_session: 1,
                    row: 3,
                    seat: 7
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.order_count(), 0);
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn order_with_multiple_tickets_keeps_request_order() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10).with_hall(2, 3, 4));

    let created = service
        .create_order(7, &[spec(1, 1, 1), spec(2, 3, 4), spec(1, 5, 10)])
        .await
        .unwrap();

    assert_eq!(created.order.user_id, 7);
    assert_eq!(created.tickets.len(), 3);

    let places: Vec<(i64, i32, i32)> = created
        .tickets
        .iter()
        .map(|t| (t.movie_session_id, t.row, t.seat))
        .collect();
    assert_eq!(places, vec![(1, 1, 1), (2, 3, 4), (1, 5, 10)]);
    assert!(created
        .tickets
        .iter()
        .all(|t| t.order_id == created.order.id));

    assert_eq!(store.ticket_count(), 3);
}

#[tokio::test]
async fn validate_reports_taken_seat_from_store() {
    let (service, store) = service(MemoryStore::new().with_hall(1, 5, 10));

    store.seed_ticket(1, 2, 2);

    let verdict = service.validate(&spec(1, 2, 2)).await.unwrap();
    assert_eq!(
        verdict,
        Err(BookingError::SeatTaken {
            movie_session: 1,
            row: 2,
            seat: 2
        })
    );

    let verdict = service.validate(&spec(1, 2, 3)).await.unwrap();
    assert_eq!(verdict, Ok(()));
}

#[tokio::test]
async fn projections_reflect_sold_tickets() {
    let (service, _store) = service(MemoryStore::new().with_hall(1, 5, 10));

    service
        .create_order(7, &[spec(1, 2, 5), spec(1, 1, 1)])
        .await
        .unwrap();

    let sold = service.store().tickets_sold(1).await.unwrap();
    assert_eq!(sold, 2);

    let places = service.store().taken_places(1).await.unwrap();
    assert_eq!(
        places,
        vec![Place { row: 1, seat: 1 }, Place { row: 2, seat: 5 }]
    );
}
