use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Wire values for `orders.status`. The generic status-update route accepts
/// arbitrary strings on top of these (see routes::orders).
pub mod order_status {
    pub const PENDING: &str = "pending";
    pub const CANCELLED: &str = "cancelled";
}

/// Wire values for `orders.payment_status`.
pub mod payment_state {
    pub const UNPAID: &str = "unpaid";
    pub const PAID: &str = "paid";
}

// Books

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::books)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct BookEntity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub cover_image: String,
    pub old_price: f32,
    pub new_price: f32,
    pub trending: bool,
    pub librarian_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::books)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookEntity {
    pub title: String,
    pub description: String,
    pub category: String,
    pub cover_image: String,
    pub old_price: f32,
    pub new_price: f32,
    #[serde(default)]
    pub trending: bool,
    #[serde(skip)]
    pub librarian_email: Option<String>,
}

/// Partial patch for a book. Absent fields are left untouched.
#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::books)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookEntity {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub old_price: Option<f32>,
    pub new_price: Option<f32>,
    pub trending: Option<bool>,
}

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: String,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Value,
    pub items: Value,
    pub total_amount: f32,
    pub status: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderEntity {
    /// A paid order is terminal with respect to cancellation.
    pub fn is_paid(&self) -> bool {
        self.payment_status == payment_state::PAID
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Value,
    pub items: Value,
    pub total_amount: f32,
    pub status: String,
    pub payment_status: String,
}

// Payments

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub email: String,
    pub payment_id: String,
    pub amount: f32,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Serialize, Deserialize, Debug)]
#[diesel(table_name = crate::schema::payments)]
pub struct CreatePaymentEntity {
    pub order_id: Uuid,
    pub email: String,
    pub payment_id: String,
    pub amount: f32,
    pub currency: String,
    pub status: String,
}
