use std::fmt;
use std::str::FromStr;

use crate::{
    core::app_error::AppError,
    models::{BookEntity, UserEntity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "user" => Ok(Role::User),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!(
                "{other} is not a valid role"
            ))),
        }
    }
}

/// Role stored on a user record. Unknown strings demote to the base role.
pub fn role_of(user: &UserEntity) -> Role {
    user.role.parse().unwrap_or(Role::User)
}

/// Role changes and account deletion are admin-only operations.
pub fn ensure_admin(actor: &UserEntity) -> Result<(), AppError> {
    if role_of(actor) == Role::Admin {
        return Ok(());
    }

    Err(AppError::ForbiddenResource(
        "Only admins can manage user accounts".into(),
    ))
}

/// A book may be mutated by an admin or by the librarian who owns it.
pub fn ensure_can_mutate_book(actor: &UserEntity, book: &BookEntity) -> Result<(), AppError> {
    if role_of(actor) == Role::Admin {
        return Ok(());
    }

    if book.librarian_email.as_deref() == Some(actor.email.as_str()) {
        return Ok(());
    }

    Err(AppError::Unauthorized(
        "You are not allowed to modify this book".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(email: &str, role: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: None,
            photo_url: None,
            role: role.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn book(librarian_email: Option<&str>) -> BookEntity {
        BookEntity {
            id: Uuid::new_v4(),
            title: "The Rust Programming Language".into(),
            description: "Systems programming".into(),
            category: "technology".into(),
            cover_image: "trpl.png".into(),
            old_price: 39.99,
            new_price: 29.99,
            trending: false,
            librarian_email: librarian_email.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn role_parsing_accepts_known_roles() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn role_parsing_rejects_unknown_roles() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "superuser is not a valid role");
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        assert!(ensure_admin(&user("a@example.com", "admin")).is_ok());
        assert!(ensure_admin(&user("l@example.com", "librarian")).is_err());
        assert!(ensure_admin(&user("u@example.com", "user")).is_err());
    }

    #[test]
    fn admins_may_mutate_any_book() {
        let actor = user("a@example.com", "admin");
        assert!(ensure_can_mutate_book(&actor, &book(None)).is_ok());
        assert!(ensure_can_mutate_book(&actor, &book(Some("l@example.com"))).is_ok());
    }

    #[test]
    fn librarians_may_mutate_only_their_own_books() {
        let actor = user("l@example.com", "librarian");
        assert!(ensure_can_mutate_book(&actor, &book(Some("l@example.com"))).is_ok());
        assert!(ensure_can_mutate_book(&actor, &book(Some("other@example.com"))).is_err());
        assert!(ensure_can_mutate_book(&actor, &book(None)).is_err());
    }

    #[test]
    fn plain_users_may_not_mutate_books() {
        let actor = user("u@example.com", "user");
        let err = ensure_can_mutate_book(&actor, &book(Some("l@example.com"))).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
