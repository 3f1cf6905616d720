use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

use crate::controllers::sessions::{SessionListItem, SessionListRow};
use crate::error::{bad_request, conflict, internal_error, not_found, ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::services::{BookingError, OrderError, TicketSpec};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", delete(delete_order))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    tickets: Vec<TicketSpec>,
}

#[derive(Debug, Serialize)]
struct CreatedTicketResponse {
    id: i64,
    row: i32,
    seat: i32,
    movie_session: i64,
}

#[derive(Debug, Serialize)]
struct CreateOrderResponse {
    id: i64,
    created_at: DateTime<Utc>,
    tickets: Vec<CreatedTicketResponse>,
}

#[derive(Debug, Deserialize)]
struct OrdersQuery {
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OrderTicketResponse {
    id: i64,
    row: i32,
    seat: i32,
    movie_session: SessionListItem,
}

#[derive(Debug, Serialize)]
struct OrderResponse {
    id: i64,
    created_at: DateTime<Utc>,
    tickets: Vec<OrderTicketResponse>,
}

/// Окно выборки по заказам: LIMIT и OFFSET из номера страницы.
/// Считается в i64, номер страницы приходит снаружи и не ограничен.
fn page_window(params: &OrdersQuery) -> (i64, i64) {
    let page = params.page.unwrap_or(1).max(1) as i64;
    let page_size = params.page_size.unwrap_or(20).clamp(1, 20) as i64;
    (page_size, (page - 1) * page_size)
}

/// Занятое место - конфликт состояния, прочие отказы проверки - плохой запрос.
fn order_error_response(err: OrderError) -> (StatusCode, Json<ApiError>) {
    let message = err.to_string();
    match err {
        OrderError::Ticket {
            reason: BookingError::SeatTaken { .. },
            ..
        } => conflict(&message),
        OrderError::Ticket { .. } | OrderError::EmptyOrder => bad_request(&message),
        OrderError::Storage(e) => internal_error("create_order storage error", e),
    }
}

// POST /api/orders
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state
        .booking
        .create_order(user.user_id, &req.tickets)
        .await
        .map_err(order_error_response)?;

    let tickets = created
        .tickets
        .into_iter()
        .map(|t| CreatedTicketResponse {
            id: t.id,
            row: t.row,
            seat: t.seat,
            movie_session: t.movie_session_id,
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            id: created.order.id,
            created_at: created.order.created_at,
            tickets,
        }),
    ))
}

// GET /api/orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<OrdersQuery>,
) -> ApiResult<impl IntoResponse> {
    let (limit, offset) = page_window(&params);

    // Страница режется по заказам, билеты подтягиваются уже к выбранной странице
    let rows = sqlx::query(
        r#"
        SELECT o.id AS order_id,
               o.created_at,
               t.id AS ticket_id,
               t.row,
               t.seat,
               ms.id AS session_id,
               ms.show_time,
               m.title AS movie_title,
               h.name AS cinema_hall_name,
               h.rows AS hall_rows,
               h.seats_in_row,
               (SELECT COUNT(*) FROM tickets tt WHERE tt.movie_session_id = ms.id) AS tickets_sold
        FROM orders o
        LEFT JOIN tickets t ON t.order_id = o.id
        LEFT JOIN movie_sessions ms ON ms.id = t.movie_session_id
        LEFT JOIN movies m ON m.id = ms.movie_id
        LEFT JOIN cinema_halls h ON h.id = ms.cinema_hall_id
        WHERE o.id IN (
            SELECT id FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
        )
        ORDER BY o.created_at DESC, o.id DESC, t.id
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| internal_error("list_orders sql error", e))?;

    let mut payload: Vec<OrderResponse> = Vec::new();
    for r in rows {
        let order_id: i64 = r.get("order_id");
        if payload.last().map(|o| o.id) != Some(order_id) {
            payload.push(OrderResponse {
                id: order_id,
                created_at: r.get("created_at"),
                tickets: Vec::new(),
            });
        }

        let ticket_id: Option<i64> = r.try_get("ticket_id").ok();
        if let Some(ticket_id) = ticket_id {
            let session = SessionListItem::project(SessionListRow {
                id: r.get("session_id"),
                show_time: r.get("show_time"),
                movie_title: r.get("movie_title"),
                cinema_hall_name: r.get("cinema_hall_name"),
                rows: r.get("hall_rows"),
                seats_in_row: r.get("seats_in_row"),
                tickets_sold: r.get("tickets_sold"),
            });

            if let Some(order) = payload.last_mut() {
                order.tickets.push(OrderTicketResponse {
                    id: ticket_id,
                    row: r.get("row"),
                    seat: r.get("seat"),
                    movie_session: session,
                });
            }
        }
    }

    Ok(Json(payload))
}

// DELETE /api/orders/{id}
async fn delete_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // Чужой заказ неотличим от несуществующего
    let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(&state.db.pool)
        .await
        .map_err(|e| internal_error("delete_order sql error", e))?;

    if result.rows_affected() == 0 {
        return Err(not_found("order not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
