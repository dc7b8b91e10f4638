use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;

use crate::users::password::{hash_password, verify_password};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Domain outcomes of store operations. Backend failures carry the source
/// error for logging at the boundary; clients only ever see a generic 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("user with email {email} already exists")]
    Conflict { email: String },
    #[error("invalid credentials")]
    AuthFailed,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence contract for user records. Any backend qualifies as long as
/// email uniqueness is enforced atomically at insert/update time.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users, ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn get_user(&self, id: i64) -> Result<User, StoreError>;

    /// Hashes the password and inserts; `Conflict` if the email is taken.
    async fn create_user(&self, name: &str, email: &str, password: &str)
        -> Result<i64, StoreError>;

    /// Partial update; unsupplied fields keep their prior value. Callers must
    /// pass at least one field.
    async fn update_user(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Idempotent: deleting an absent id is still `Ok`.
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    /// Unanchored substring match on name.
    async fn search_users(&self, name: &str) -> Result<Vec<User>, StoreError>;

    /// `AuthFailed` uniformly for unknown email and wrong password.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.into())
}

fn unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(backend)?;
        Ok(users)
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(backend)?;
        user.ok_or(StoreError::NotFound)
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, StoreError> {
        let password_hash = hash_password(password)?;
        // The UNIQUE constraint on email makes the check-and-insert atomic;
        // concurrent duplicates lose with a unique violation.
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                StoreError::Conflict {
                    email: email.to_string(),
                }
            } else {
                backend(e)
            }
        })?;
        Ok(id)
    }

    async fn update_user(
        &self,
        id: i64,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($1, name), email = COALESCE($2, email)
            WHERE id = $3
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                StoreError::Conflict {
                    email: email.unwrap_or_default().to_string(),
                }
            } else {
                backend(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn search_users(&self, name: &str) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash
            FROM users
            WHERE name ILIKE $1
            ORDER BY id
            "#,
        )
        .bind(format!("%{name}%"))
        .fetch_all(&self.db)
        .await
        .map_err(backend)?;
        Ok(users)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(backend)?;

        // Same error for unknown email and bad password. Timing between the
        // two paths is not equalized.
        let Some(user) = user else {
            return Err(StoreError::AuthFailed);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(StoreError::AuthFailed)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryUserStore;
    use super::*;

    #[tokio::test]
    async fn create_assigns_unique_ids_and_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        let a = store
            .create_user("John Doe", "john@example.com", "password123")
            .await
            .expect("first create");
        let b = store
            .create_user("Jane Smith", "jane@example.com", "secret456")
            .await
            .expect("second create");
        assert_ne!(a, b);

        let err = store
            .create_user("John Clone", "john@example.com", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref email } if email == "john@example.com"));
        assert_eq!(store.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_update_keeps_unsupplied_fields() {
        let store = MemoryUserStore::new();
        let id = store
            .create_user("Bob Johnson", "bob@example.com", "qwerty789")
            .await
            .unwrap();

        store
            .update_user(id, Some("Robert Johnson"), None)
            .await
            .unwrap();
        let user = store.get_user(id).await.unwrap();
        assert_eq!(user.name, "Robert Johnson");
        assert_eq!(user.email, "bob@example.com");

        assert!(matches!(
            store.update_user(9999, Some("Nobody"), None).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryUserStore::new();
        let id = store
            .create_user("Jane Smith", "jane@example.com", "secret456")
            .await
            .unwrap();

        store.delete_user(id).await.unwrap();
        assert!(matches!(
            store.get_user(id).await,
            Err(StoreError::NotFound)
        ));
        // Deleting again (or a never-existing id) is still Ok.
        store.delete_user(id).await.unwrap();
        store.delete_user(424242).await.unwrap();
    }

    #[tokio::test]
    async fn verify_credentials_fails_uniformly() {
        let store = MemoryUserStore::new();
        store
            .create_user("Jane Smith", "jane@example.com", "secret456")
            .await
            .unwrap();

        let ok = store
            .verify_credentials("jane@example.com", "secret456")
            .await
            .unwrap();
        assert_eq!(ok.email, "jane@example.com");

        let wrong_password = store
            .verify_credentials("jane@example.com", "nope")
            .await
            .unwrap_err();
        let unknown_email = store
            .verify_credentials("ghost@example.com", "secret456")
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, StoreError::AuthFailed));
        assert!(matches!(unknown_email, StoreError::AuthFailed));
    }

    #[test]
    fn user_serialization_omits_password_hash() {
        let user = User {
            id: 7,
            name: "Jane Smith".into(),
            email: "jane@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }
}
