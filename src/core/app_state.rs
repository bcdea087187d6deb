use std::sync::Arc;

use diesel_async::{AsyncPgConnection, pooled_connection::bb8::Pool};

use crate::api::{checkout::CheckoutGateway, identity::TokenVerifier};

pub type DbPool = Pool<AsyncPgConnection>;

/// Shared application state handed to every handler. External collaborators
/// (checkout gateway, token verifier) are injected here rather than reached
/// through module globals.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub checkout: Arc<dyn CheckoutGateway>,
    pub verifier: Arc<dyn TokenVerifier>,
}
