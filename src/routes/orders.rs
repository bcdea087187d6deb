use anyhow::{Context, Result};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        aliases::DieselError,
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{CreateOrderEntity, OrderEntity, order_status, payment_state},
    schema::orders,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(update_status))
            .routes(utoipa_axum::routes!(cancel_order)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CreateOrderReq {
    user_id: String,
    name: String,
    email: String,
    phone: String,
    address: Value,
    items: Value,
    total_amount: f32,
}

/// Place an order. Totals and line items are captured verbatim from the
/// request; the order starts pending and unpaid.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<OrderEntity, String>)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = diesel::insert_into(orders::table)
        .values(CreateOrderEntity {
            user_id: body.user_id,
            name: body.name,
            email: body.email,
            phone: body.phone,
            address: body.address,
            items: body.items,
            total_amount: body.total_amount,
            status: order_status::PENDING.into(),
            payment_status: payment_state::UNPAID.into(),
        })
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create order")?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Created order successfully"),
    })
}

#[derive(Deserialize)]
struct ListOrdersQuery {
    email: Option<String>,
}

/// Fetch orders, newest first, optionally filtered by customer email.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    params(
        ("email" = Option<String>, Query, description = "Filter orders by customer email")
    ),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<OrderEntity>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut select = orders::table.into_boxed();
    if let Some(email) = query.email {
        select = select.filter(orders::email.eq(email));
    }

    let orders: Vec<OrderEntity> = select
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

/// Fetch a single order.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table.find(id).get_result(conn).await;

    if let Err(err) = order {
        match err {
            DieselError::NotFound => return Err(AppError::NotFound),
            _ => return Err(AppError::Other(err.into())),
        }
    }

    let order = order.unwrap();

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateStatusReq {
    status: String,
}

/// Set an order's status to the supplied value. No transition validation is
/// applied here; the dedicated cancel route carries the guard rails.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Updated order status", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn update_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated: OrderEntity = diesel::update(orders::table.find(id))
        .set(orders::status.eq(body.status))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated order status successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct CancelOrderRes {
    success: bool,
}

/// Orders that have been paid can no longer be cancelled.
fn ensure_cancellable(order: &OrderEntity) -> Result<(), AppError> {
    if order.is_paid() {
        return Err(AppError::BadRequest(
            "Paid orders cannot be cancelled".into(),
        ));
    }

    Ok(())
}

/// Cancel an unpaid order, stamping the cancellation time.
#[utoipa::path(
    patch,
    path = "/{id}/cancel",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Cancelled order successfully", body = CancelOrderRes),
        (status = 400, description = "Order has already been paid"),
        (status = 404, description = "Order not found")
    )
)]
async fn cancel_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    conn.transaction(move |conn| {
        Box::pin(async move {
            let order: OrderEntity = orders::table
                .find(id)
                .get_result(conn)
                .await
                .map_err(|_| AppError::NotFound)?;

            ensure_cancellable(&order)?;

            // The filter re-checks payment_status so a reconciliation racing
            // this request cannot cancel an order it just marked paid.
            let cancelled = diesel::update(
                orders::table
                    .find(id)
                    .filter(orders::payment_status.ne(payment_state::PAID)),
            )
            .set((
                orders::status.eq(order_status::CANCELLED),
                orders::cancelled_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await
            .context("Failed to cancel order")?;

            if cancelled == 0 {
                return Err(AppError::BadRequest(
                    "Paid orders cannot be cancelled".into(),
                ));
            }

            Ok::<(), AppError>(())
        })
    })
    .await?;

    Ok(Json(CancelOrderRes { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(payment_status: &str) -> OrderEntity {
        OrderEntity {
            id: Uuid::new_v4(),
            user_id: "uid-1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
            address: serde_json::json!({"city": "London"}),
            items: serde_json::json!([{"bookId": "b1", "quantity": 1}]),
            total_amount: 50.0,
            status: order_status::PENDING.into(),
            payment_status: payment_status.into(),
            transaction_id: None,
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn unpaid_orders_are_cancellable() {
        assert!(ensure_cancellable(&order(payment_state::UNPAID)).is_ok());
    }

    #[test]
    fn paid_orders_are_not_cancellable() {
        let err = ensure_cancellable(&order(payment_state::PAID)).unwrap_err();
        assert_eq!(err.to_string(), "Paid orders cannot be cancelled");
    }
}
