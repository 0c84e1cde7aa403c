//! Users, roles, credentials, and the admin operations over them.
//!
//! The service enforces the identity invariants: unique case-insensitive
//! emails, exactly one super administrator provisioned at cold start,
//! no self-targeted destructive operations, and no path that promotes a
//! user to super administrator.

mod password;
mod token;

pub use password::{hash_password, validate_policy, verify_password, MIN_PASSWORD_LEN};
pub use token::{Claims, TokenSigner};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, ordered by privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

/// A registered account.
///
/// The password hash is never serialized out; API responses carry the
/// remaining fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Stored lowercased; uniqueness is case-insensitive
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Administrative operation on a target account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminOp {
    Activate,
    Deactivate,
    GrantAdmin,
    RevokeAdmin,
    Delete,
}

/// Errors from identity operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is deactivated")]
    Inactive,

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("password policy violation: {0}")]
    PasswordPolicy(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflicting operation: {0}")]
    Conflict(String),

    #[error("user storage error: {0}")]
    Storage(String),

    #[error("credential processing error: {0}")]
    Hash(String),
}

/// Storage contract for user accounts.
///
/// Email lookups take the lowercased form; implementations keep a unique
/// secondary index on it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<(), AuthError>;
    async fn get(&self, id: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_email(&self, email_lower: &str) -> Result<Option<User>, AuthError>;
    async fn update(&self, user: User) -> Result<(), AuthError>;
    async fn delete(&self, id: &str) -> Result<bool, AuthError>;
    async fn list(&self) -> Result<Vec<User>, AuthError>;
    async fn count_role(&self, role: Role) -> Result<usize, AuthError>;
}

#[derive(Default)]
struct MemoryUserInner {
    by_id: HashMap<String, User>,
    email_index: HashMap<String, String>,
}

/// In-memory user store; a durable document store mounts behind the same
/// trait in production.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<MemoryUserInner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<(), AuthError> {
        let mut inner = self.inner.write();
        let email_key = user.email.to_lowercase();
        if inner.email_index.contains_key(&email_key) {
            return Err(AuthError::DuplicateEmail(user.email));
        }
        inner.email_index.insert(email_key, user.id.clone());
        inner.by_id.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.inner.read().by_id.get(id).cloned())
    }

    async fn find_by_email(&self, email_lower: &str) -> Result<Option<User>, AuthError> {
        let inner = self.inner.read();
        Ok(inner
            .email_index
            .get(email_lower)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn update(&self, user: User) -> Result<(), AuthError> {
        let mut inner = self.inner.write();
        if !inner.by_id.contains_key(&user.id) {
            return Err(AuthError::UserNotFound(user.id));
        }
        inner.by_id.insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AuthError> {
        let mut inner = self.inner.write();
        match inner.by_id.remove(id) {
            Some(user) => {
                inner.email_index.remove(&user.email.to_lowercase());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users: Vec<User> = self.inner.read().by_id.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn count_role(&self, role: Role) -> Result<usize, AuthError> {
        Ok(self
            .inner
            .read()
            .by_id
            .values()
            .filter(|u| u.role == role)
            .count())
    }
}

/// Identity service: registration, authentication, token verification,
/// and role-checked administration.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    signer: TokenSigner,
}

impl AuthService {
    /// Construct the service and provision the super administrator if the
    /// store has none.
    pub async fn bootstrap(
        store: Arc<dyn UserStore>,
        signer: TokenSigner,
        admin_email: &str,
        admin_password: &str,
    ) -> Result<Self, AuthError> {
        if store.count_role(Role::SuperAdmin).await? == 0 {
            let admin = User {
                id: Uuid::new_v4().to_string(),
                email: admin_email.to_lowercase(),
                password_hash: hash_password(admin_password)?,
                full_name: "Administrator".to_string(),
                role: Role::SuperAdmin,
                is_active: true,
                created_at: Utc::now(),
                last_login: None,
            };
            store.insert(admin).await?;
            tracing::info!(email = %admin_email, "provisioned super administrator");
        }
        Ok(Self { store, signer })
    }

    /// Register a new account and return it with a freshly issued token.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<(User, String), AuthError> {
        let email_lower = email.trim().to_lowercase();
        if email_lower.is_empty() || !email_lower.contains('@') {
            return Err(AuthError::PasswordPolicy(format!(
                "invalid email address: {}",
                email
            )));
        }
        validate_policy(password)?;
        if self.store.find_by_email(&email_lower).await?.is_some() {
            return Err(AuthError::DuplicateEmail(email_lower));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email_lower,
            password_hash: hash_password(password)?,
            full_name: full_name.trim().to_string(),
            role: Role::User,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        self.store.insert(user.clone()).await?;
        let token = self.signer.issue(&user)?;
        Ok((user, token))
    }

    /// Verify credentials and issue a token. Deactivated accounts cannot
    /// authenticate.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        let email_lower = email.trim().to_lowercase();
        let mut user = self
            .store
            .find_by_email(&email_lower)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        user.last_login = Some(Utc::now());
        self.store.update(user.clone()).await?;
        let token = self.signer.issue(&user)?;
        Ok((user, token))
    }

    /// Verify a token and resolve its subject.
    ///
    /// Rejects expired, tampered, and unknown-subject tokens, and tokens
    /// whose subject has since been deactivated.
    pub async fn verify(&self, token: &str) -> Result<(Claims, User), AuthError> {
        let claims = self.signer.verify(token)?;
        let user = self
            .store
            .get(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok((claims, user))
    }

    /// All accounts, for admin listings.
    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, AuthError> {
        if actor.role < Role::Admin {
            return Err(AuthError::Forbidden(
                "administrator role required".to_string(),
            ));
        }
        self.store.list().await
    }

    /// Apply an administrative operation to a target account.
    ///
    /// Self-targeting is rejected for every op; the super administrator
    /// can be neither demoted, deactivated, nor deleted. Returns the
    /// affected account (its final state before removal, for deletes).
    pub async fn administer(
        &self,
        actor: &User,
        target_id: &str,
        op: AdminOp,
    ) -> Result<User, AuthError> {
        if actor.role < Role::Admin {
            return Err(AuthError::Forbidden(
                "administrator role required".to_string(),
            ));
        }
        if actor.id == target_id {
            return Err(AuthError::Conflict(
                "cannot target your own account".to_string(),
            ));
        }

        let mut target = self
            .store
            .get(target_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(target_id.to_string()))?;

        if target.role == Role::SuperAdmin {
            return Err(AuthError::Conflict(
                "the super administrator cannot be modified".to_string(),
            ));
        }

        match op {
            AdminOp::Activate => target.is_active = true,
            AdminOp::Deactivate => target.is_active = false,
            AdminOp::GrantAdmin => target.role = Role::Admin,
            AdminOp::RevokeAdmin => target.role = Role::User,
            AdminOp::Delete => {
                self.store.delete(target_id).await?;
                return Ok(target);
            }
        }

        self.store.update(target.clone()).await?;
        Ok(target)
    }
}
