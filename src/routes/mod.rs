pub mod books;
pub mod orders;
pub mod payments;
pub mod users;

/// Liveness probe.
pub async fn root() -> &'static str {
    "Server UP"
}
