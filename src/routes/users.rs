use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    api::identity::{AuthIdentity, TokenVerifier},
    authz::{self, Role},
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{CreateUserEntity, UserEntity},
    schema::users,
};

pub fn routes_with_openapi(verifier: Arc<dyn TokenVerifier>) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/users",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register_user))
            .routes(utoipa_axum::routes!(get_user))
            .routes(utoipa_axum::routes!(update_role))
            .routes(utoipa_axum::routes!(delete_user))
            .route_layer(axum::middleware::from_fn_with_state(
                verifier,
                middleware::authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct RegisterUserReq {
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
}

/// Self-registration: creates a user record for the verified identity.
/// Registering an email that already exists is a success, not an error.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    request_body = RegisterUserReq,
    responses(
        (status = 200, description = "User registered (or already present)", body = StdResponse<UserEntity, String>),
        (status = 403, description = "Payload email does not match the verified identity")
    )
)]
async fn register_user(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<RegisterUserReq>,
) -> Result<impl IntoResponse, AppError> {
    if identity.email != body.email {
        return Err(AppError::ForbiddenResource(
            "You can only register your own account".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let inserted: Option<UserEntity> = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            email: body.email.clone(),
            display_name: body.display_name,
            photo_url: body.photo_url,
            role: Role::User.as_str().into(),
        })
        .on_conflict(users::email)
        .do_nothing()
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to register user")?;

    if let Some(user) = inserted {
        return Ok(StdResponse {
            data: Some(user),
            message: Some("User registered successfully"),
        });
    }

    let existing: UserEntity = users::table
        .filter(users::email.eq(&body.email))
        .get_result(conn)
        .await
        .context("Failed to fetch existing user")?;

    Ok(StdResponse {
        data: Some(existing),
        message: Some("User already exists"),
    })
}

/// Fetch a user record by email.
#[utoipa::path(
    get,
    path = "/email/{email}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("email" = String, Path, description = "Email of the user to fetch")
    ),
    responses(
        (status = 200, description = "Get user successfully", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
async fn get_user(
    Path(email): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = users::table
        .filter(users::email.eq(&email))
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(user),
        message: Some("Get user successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateRoleReq {
    role: String,
}

/// Change another user's role. Admin only; the role value is validated
/// before any store mutation.
#[utoipa::path(
    patch,
    path = "/{id}/role",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID whose role to change")
    ),
    request_body = UpdateRoleReq,
    responses(
        (status = 200, description = "Updated role successfully", body = StdResponse<UserEntity, String>),
        (status = 400, description = "Invalid role value"),
        (status = 403, description = "Requester is not an admin"),
        (status = 404, description = "Target user not found")
    )
)]
async fn update_role(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<UpdateRoleReq>,
) -> Result<impl IntoResponse, AppError> {
    let role: Role = body.role.parse()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = requesting_user(conn, &identity.email).await?;
    authz::ensure_admin(&actor)?;

    let updated: UserEntity = diesel::update(users::table.find(id))
        .set((
            users::role.eq(role.as_str()),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated role successfully"),
    })
}

/// Delete a user account. Admin only.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted user successfully", body = StdResponse<String, String>),
        (status = 403, description = "Requester is not an admin"),
        (status = 404, description = "Target user not found")
    )
)]
async fn delete_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let actor = requesting_user(conn, &identity.email).await?;
    authz::ensure_admin(&actor)?;

    let deleted = diesel::delete(users::table.find(id))
        .execute(conn)
        .await
        .context("Failed to delete user")?;

    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok(StdResponse::<String, &str> {
        data: None,
        message: Some("Deleted user successfully"),
    })
}

/// Looks up the user record behind the verified identity. Identities without
/// a record hold no role and fail the guard here.
async fn requesting_user(
    conn: &mut diesel_async::pooled_connection::bb8::PooledConnection<
        '_,
        diesel_async::AsyncPgConnection,
    >,
    email: &str,
) -> Result<UserEntity, AppError> {
    let actor: Option<UserEntity> = users::table
        .filter(users::email.eq(email))
        .get_result(conn)
        .await
        .optional()
        .context("Failed to look up the requesting user")?;

    actor.ok_or_else(|| {
        AppError::ForbiddenResource("Only admins can manage user accounts".into())
    })
}
