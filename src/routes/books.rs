use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api::identity::{AuthIdentity, TokenVerifier},
    authz,
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{BookEntity, CreateBookEntity, UpdateBookEntity, UserEntity},
    schema::{books, users},
};

pub fn routes_with_openapi(verifier: Arc<dyn TokenVerifier>) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/books",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_books))
            .routes(utoipa_axum::routes!(get_book))
            .merge(
                OpenApiRouter::new()
                    .routes(utoipa_axum::routes!(create_book))
                    .routes(utoipa_axum::routes!(update_book))
                    .routes(utoipa_axum::routes!(delete_book))
                    .route_layer(axum::middleware::from_fn_with_state(
                        verifier,
                        middleware::authorization,
                    )),
            ),
    )
}

/// Fetch all books, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Books"],
    responses(
        (status = 200, description = "List all books", body = StdResponse<Vec<BookEntity>, String>)
    )
)]
async fn get_books(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let books: Vec<BookEntity> = books::table
        .order_by(books::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get books")?;

    Ok(StdResponse {
        data: Some(books),
        message: Some("Get books successfully"),
    })
}

/// Fetch a single book.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Books"],
    params(
        ("id" = Uuid, Path, description = "Book ID to fetch")
    ),
    responses(
        (status = 200, description = "Get book successfully", body = StdResponse<BookEntity, String>),
        (status = 404, description = "Book not found")
    )
)]
async fn get_book(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let book: BookEntity = books::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(book),
        message: Some("Get book successfully"),
    })
}

/// Add a book to the catalogue. The verified identity becomes the owning
/// librarian.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Books"],
    security(("bearerAuth" = [])),
    request_body = CreateBookEntity,
    responses(
        (status = 200, description = "Created book successfully", body = StdResponse<BookEntity, String>)
    )
)]
async fn create_book(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(mut body): Json<CreateBookEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    body.librarian_email = Some(identity.email);

    let book = diesel::insert_into(books::table)
        .values(body)
        .returning(BookEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create book")?;

    Ok(StdResponse {
        data: Some(book),
        message: Some("Created book successfully"),
    })
}

/// Update a book. Allowed for admins and for the librarian owning the book.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Books"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID to update")
    ),
    request_body = UpdateBookEntity,
    responses(
        (status = 200, description = "Updated book successfully", body = StdResponse<BookEntity, String>),
        (status = 401, description = "Actor may not modify this book"),
        (status = 403, description = "Actor has no user record"),
        (status = 404, description = "Book not found")
    )
)]
async fn update_book(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<UpdateBookEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor: Option<UserEntity> = users::table
        .filter(users::email.eq(&identity.email))
        .get_result(conn)
        .await
        .optional()
        .context("Failed to look up the requesting user")?;

    let Some(actor) = actor else {
        return Err(AppError::ForbiddenResource(
            "You must be registered to modify books".into(),
        ));
    };

    let book: BookEntity = books::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    authz::ensure_can_mutate_book(&actor, &book)?;

    let updated = diesel::update(books::table.find(id))
        .set((&body, books::updated_at.eq(diesel::dsl::now)))
        .returning(BookEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to update book")?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated book successfully"),
    })
}

/// Remove a book from the catalogue.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Books"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted book successfully", body = StdResponse<String, String>),
        (status = 404, description = "Book not found")
    )
)]
async fn delete_book(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(_identity): Extension<AuthIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted = diesel::delete(books::table.find(id))
        .execute(conn)
        .await
        .context("Failed to delete book")?;

    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StdResponse::<String, &str> {
        data: None,
        message: Some("Deleted book successfully"),
    })
}
