//! Lookup of notification recipients.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Role, UserId};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{CheckoutError, Result};

/// Where order notifications go: the purchaser's phone and every admin's
/// e-mail address.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Phone number of a user, if the user exists and has one.
    async fn phone_for(&self, user_id: UserId) -> Result<Option<String>>;

    /// E-mail addresses of all admin users.
    async fn admin_emails(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    email: String,
    phone: Option<String>,
    role: Role,
}

/// In-memory user directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<BTreeMap<UserId, DirectoryEntry>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn add_user(
        &self,
        user_id: UserId,
        email: impl Into<String>,
        phone: Option<&str>,
        role: Role,
    ) {
        self.users.write().await.insert(
            user_id,
            DirectoryEntry {
                email: email.into(),
                phone: phone.map(str::to_string),
                role,
            },
        );
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn phone_for(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self
            .users
            .read()
            .await
            .get(&user_id)
            .and_then(|entry| entry.phone.clone())
            .filter(|phone| !phone.is_empty()))
    }

    async fn admin_emails(&self) -> Result<Vec<String>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|entry| entry.role == Role::Admin)
            .map(|entry| entry.email.clone())
            .collect())
    }
}

/// User directory over the account tables (`users` joined to `roles`).
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = std::result::Result<T, sqlx::Error>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CheckoutError::DirectoryTimeout)?
            .map_err(CheckoutError::from)
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[tracing::instrument(skip(self))]
    async fn phone_for(&self, user_id: UserId) -> Result<Option<String>> {
        let phone: Option<Option<String>> = self
            .bounded(
                sqlx::query_scalar("SELECT phone FROM users WHERE id = $1")
                    .bind(user_id.as_i64())
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(phone.flatten().filter(|p| !p.is_empty()))
    }

    #[tracing::instrument(skip(self))]
    async fn admin_emails(&self) -> Result<Vec<String>> {
        self.bounded(
            sqlx::query_scalar(
                "SELECT u.email FROM users u JOIN roles r ON u.role_id = r.id \
                 WHERE r.name = 'admin' ORDER BY u.id",
            )
            .fetch_all(&self.pool),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admin_emails_only_lists_admins() {
        let directory = InMemoryUserDirectory::new();
        directory
            .add_user(UserId::new(1), "buyer@example.com", Some("254700000001"), Role::Customer)
            .await;
        directory
            .add_user(UserId::new(2), "boss@example.com", None, Role::Admin)
            .await;

        assert_eq!(
            directory.admin_emails().await.unwrap(),
            vec!["boss@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unresponsive_database_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(&format!("postgres://postgres:postgres@{addr}/postgres"))
            .unwrap();

        let directory = PgUserDirectory::new(pool).with_timeout(Duration::from_millis(200));
        assert!(matches!(
            directory.admin_emails().await,
            Err(CheckoutError::DirectoryTimeout)
        ));
    }

    #[tokio::test]
    async fn test_phone_lookup() {
        let directory = InMemoryUserDirectory::new();
        directory
            .add_user(UserId::new(1), "a@example.com", Some("254700000001"), Role::Customer)
            .await;
        directory
            .add_user(UserId::new(2), "b@example.com", Some(""), Role::Customer)
            .await;

        assert_eq!(
            directory.phone_for(UserId::new(1)).await.unwrap().as_deref(),
            Some("254700000001")
        );
        assert_eq!(directory.phone_for(UserId::new(2)).await.unwrap(), None);
        assert_eq!(directory.phone_for(UserId::new(3)).await.unwrap(), None);
    }
}
