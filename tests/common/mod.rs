//! In-memory хранилище для прогона логики заказа без Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use cinema_api::models::{Order, Ticket};
use cinema_api::services::{
    BookingError, BookingStore, CreatedOrder, HallLayout, OrderError, Place, TicketSpec,
};

pub struct MemoryStore {
    halls: HashMap<i64, HallLayout>,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    /// Занятые места, которые видят проверки.
    visible: HashSet<(i64, i32, i32)>,
    /// Места, всплывающие только на коммите - имитация конкурентной записи,
    /// проскочившей мимо проверок.
    phantom: HashSet<(i64, i32, i32)>,
    /// Заказы и билеты, записанные через insert_order.
    orders: Vec<Order>,
    tickets: Vec<Ticket>,
    next_order_id: i64,
    next_ticket_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            halls: HashMap::new(),
            state: Mutex::new(StoreState {
                next_order_id: 1,
                next_ticket_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn with_hall(mut self, session_id: i64, rows: i32, seats_in_row: i32) -> Self {
        self.halls
            .insert(session_id, HallLayout { rows, seats_in_row });
        self
    }

    /// Уже проданное место, видимое проверкам.
    pub fn seed_ticket(&self, session_id: i64, row: i32, seat: i32) {
        self.state
            .lock()
            .unwrap()
            .visible
            .insert((session_id, row, seat));
    }

    /// Место, которое проверки не увидят, но коммит об него споткнётся.
    pub fn plant_phantom(&self, session_id: i64, row: i32, seat: i32) {
        self.state
            .lock()
            .unwrap()
            .phantom
            .insert((session_id, row, seat));
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    /// Сколько билетов записано именно заказами (посев не считается).
    pub fn ticket_count(&self) -> usize {
        self.state.lock().unwrap().tickets.len()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn hall_for_session(&self, movie_session: i64) -> anyhow::Result<Option<HallLayout>> {
        Ok(self.halls.get(&movie_session).copied())
    }

    async fn ticket_exists(
        &self,
        movie_session: i64,
        row: i32,
        seat: i32,
    ) -> anyhow::Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .visible
            .contains(&(movie_session, row, seat)))
    }

    async fn tickets_sold(&self, movie_session: i64) -> anyhow::Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .visible
            .iter()
            .filter(|(session, _, _)| *session == movie_session)
            .count() as i64)
    }

    async fn taken_places(&self, movie_session: i64) -> anyhow::Result<Vec<Place>> {
        let state = self.state.lock().unwrap();
        let mut places: Vec<Place> = state
            .visible
            .iter()
            .filter(|(session, _, _)| *session == movie_session)
            .map(|&(_, row, seat)| Place { row, seat })
            .collect();
        places.sort_by_key(|p| (p.row, p.seat));
        Ok(places)
    }

    async fn insert_order(
        &self,
        user_id: i32,
        specs: &[TicketSpec],
    ) -> Result<CreatedOrder, OrderError> {
        let mut state = self.state.lock().unwrap();

        // Как настоящая транзакция: до полного успеха ничего не публикуется
        for (index, spec) in specs.iter().enumerate() {
            if !self.halls.contains_key(&spec.movie_session) {
                return Err(OrderError::Ticket {
                    index,
                    reason: BookingError::UnknownSession(spec.movie_session),
                });
            }

            let key = (spec.movie_session, spec.row, spec.seat);
            if state.visible.contains(&key) || state.phantom.contains(&key) {
                return Err(OrderError::Ticket {
                    index,
                    reason: BookingError::SeatTaken {
                        movie_session: spec.movie_session,
                        row: spec.row,
                        seat: spec.seat,
                    },
                });
            }
        }

        let order = Order {
            id: state.next_order_id,
            user_id,
            created_at: Utc::now(),
        };
        state.next_order_id += 1;

        let mut tickets = Vec::with_capacity(specs.len());
        for spec in specs {
            let ticket = Ticket {
                id: state.next_ticket_id,
                order_id: order.id,
                movie_session_id: spec.movie_session,
                row: spec.row,
                seat: spec.seat,
            };
            state.next_ticket_id += 1;
            state
                .visible
                .insert((spec.movie_session, spec.row, spec.seat));
            state.tickets.push(ticket.clone());
            tickets.push(ticket);
        }
        state.orders.push(order.clone());

        Ok(CreatedOrder { order, tickets })
    }
}
