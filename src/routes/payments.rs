use anyhow::{Context, Result, anyhow};
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api::checkout::{CreateSessionParams, PAYMENT_STATUS_PAID, to_minor_units, validate_paid_session},
    core::{app_error::AppError, app_state::AppState},
    models::{CreatePaymentEntity, OrderEntity, PaymentEntity, payment_state},
    schema::{orders, payments},
};

const CURRENCY: &str = "usd";

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_checkout_session))
        .routes(utoipa_axum::routes!(payment_success))
        .routes(utoipa_axum::routes!(list_payments))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct CheckoutSessionReq {
    cost: f32,
    order_id: Uuid,
    name: String,
    email: String,
}

#[derive(Serialize, ToSchema)]
struct CheckoutSessionRes {
    url: String,
}

/// Request a hosted checkout session for an order and hand back the redirect
/// URL. The order id travels through the gateway as session metadata.
#[utoipa::path(
    post,
    path = "/payment-checkout-session",
    tags = ["Payments"],
    request_body = CheckoutSessionReq,
    responses(
        (status = 200, description = "Hosted session created", body = CheckoutSessionRes),
        (status = 500, description = "Gateway rejected the session request")
    )
)]
async fn create_checkout_session(
    State(state): State<AppState>,
    Json(body): Json<CheckoutSessionReq>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .checkout
        .create_session(CreateSessionParams {
            amount_minor_units: to_minor_units(body.cost),
            currency: CURRENCY.into(),
            customer_email: body.email,
            display_name: body.name,
            order_id: body.order_id,
        })
        .await?;

    Ok(Json(CheckoutSessionRes { url: session.url }))
}

#[derive(Deserialize)]
struct PaymentSuccessQuery {
    session_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct PaymentSuccessRes {
    success: bool,
    message: String,
    payment_id: String,
}

enum ReconcileOutcome {
    Recorded,
    AlreadyProcessed,
}

/// Reconcile a completed checkout session into local state: mark the order
/// paid and record the payment, exactly once per payment intent. Replays
/// (webhook redelivery, success-page refresh) land on the payments UNIQUE
/// constraint and return the same success without touching the order again.
#[utoipa::path(
    patch,
    path = "/payment-success",
    tags = ["Payments"],
    params(
        ("session_id" = Option<String>, Query, description = "Checkout session to reconcile")
    ),
    responses(
        (status = 200, description = "Payment reconciled", body = PaymentSuccessRes),
        (status = 400, description = "Missing session_id, payment not completed, or invalid metadata"),
        (status = 500, description = "Unexpected gateway or store failure")
    )
)]
async fn payment_success(
    State(state): State<AppState>,
    Query(query): Query<PaymentSuccessQuery>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing session_id".into()))?;

    let session = state.checkout.retrieve_session(&session_id).await?;
    let paid = validate_paid_session(&session)?;
    let payment_intent_id = paid.payment_intent_id.clone();

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let outcome = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: Option<OrderEntity> = orders::table
                    .find(paid.order_id)
                    .get_result(conn)
                    .await
                    .optional()
                    .context("Failed to look up the order for the session")?;

                let Some(order) = order else {
                    return Err(anyhow!(
                        "Order {} referenced by session metadata does not exist",
                        paid.order_id
                    )
                    .into());
                };

                let payer_email = paid.customer_email.clone().unwrap_or(order.email);

                let inserted = diesel::insert_into(payments::table)
                    .values(CreatePaymentEntity {
                        order_id: paid.order_id,
                        email: payer_email,
                        payment_id: paid.payment_intent_id.clone(),
                        amount: paid.amount,
                        currency: paid.currency.clone(),
                        status: PAYMENT_STATUS_PAID.into(),
                    })
                    .on_conflict(payments::payment_id)
                    .do_nothing()
                    .execute(conn)
                    .await
                    .context("Failed to record payment")?;

                if inserted == 0 {
                    return Ok::<ReconcileOutcome, AppError>(ReconcileOutcome::AlreadyProcessed);
                }

                diesel::update(orders::table.find(paid.order_id))
                    .set((
                        orders::payment_status.eq(payment_state::PAID),
                        orders::transaction_id.eq(paid.payment_intent_id.clone()),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to mark the order as paid")?;

                Ok(ReconcileOutcome::Recorded)
            })
        })
        .await?;

    let message = match outcome {
        ReconcileOutcome::Recorded => "Payment recorded successfully",
        ReconcileOutcome::AlreadyProcessed => "Payment already processed",
    };

    Ok(Json(PaymentSuccessRes {
        success: true,
        message: message.into(),
        payment_id: payment_intent_id,
    }))
}

#[derive(Deserialize)]
struct ListPaymentsQuery {
    email: Option<String>,
}

/// Fetch a customer's payments, newest first.
#[utoipa::path(
    get,
    path = "/payments",
    tags = ["Payments"],
    params(
        ("email" = Option<String>, Query, description = "Customer email to list payments for")
    ),
    responses(
        (status = 200, description = "List payments", body = Vec<PaymentEntity>),
        (status = 400, description = "Missing email")
    )
)]
async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let email = query
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing email".into()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payments: Vec<PaymentEntity> = payments::table
        .filter(payments::email.eq(email))
        .order_by(payments::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get payments")?;

    Ok(Json(payments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_response_uses_the_contract_keys() {
        let res = PaymentSuccessRes {
            success: true,
            message: "Payment recorded successfully".into(),
            payment_id: "pi_1".into(),
        };

        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["paymentId"], "pi_1");
        assert_eq!(value["message"], "Payment recorded successfully");
    }
}
