// --------------------------------------------------
// Authentication: password hashing, in-memory sessions and the
// request-scoped AuthContext handed to every protected handler.
// --------------------------------------------------

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
    time::{Duration, Instant},
};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::SeedUser;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::store::{Store, StoreError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "taskboard_session";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("hashing worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

// Who is making the request. Built per request from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden("not allowed".to_string()))
        }
    }
}

impl From<&User> for AuthContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_token(&parts.headers)
            .and_then(|token| state.sessions.get(&token))
            .ok_or(AppError::Unauthorized)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

// Malformed stored hashes simply fail verification
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn authenticate(users: &[User], username: &str, password: &str) -> Option<AuthContext> {
    users
        .iter()
        .find(|u| u.username == username)
        .filter(|u| verify_password(password, &u.password_hash))
        .map(AuthContext::from)
}

// argon2 is CPU-bound; keep it off the async workers
pub async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn authenticate_blocking(
    users: Vec<User>,
    username: String,
    password: String,
) -> Result<Option<AuthContext>, AuthError> {
    Ok(tokio::task::spawn_blocking(move || authenticate(&users, &username, &password)).await?)
}

#[derive(Debug, Clone)]
struct Session {
    ctx: AuthContext,
    expires_at: Instant,
}

// Token -> identity, each entry valid for `ttl` after login
#[derive(Debug)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Expired entries are pruned on every login
    pub fn create(&self, ctx: AuthContext) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut sessions = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                ctx,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<AuthContext> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.ctx.clone())
    }

    pub fn remove(&self, token: &str) -> Option<AuthContext> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .map(|s| s.ctx)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, secure: bool, max_age: Duration) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

// Adds configured users that don't exist yet. Existing usernames are left alone.
pub async fn seed_users(store: &Store, seeds: &[SeedUser]) -> Result<usize, AuthError> {
    let existing: Vec<String> = store.load()?.users.into_iter().map(|u| u.username).collect();

    let mut fresh = Vec::new();
    for seed in seeds.iter().filter(|s| !existing.contains(&s.username)) {
        fresh.push(User {
            id: Uuid::new_v4(),
            username: seed.username.clone(),
            password_hash: hash_password_blocking(seed.password.clone()).await?,
            role: seed.role,
        });
    }
    if fresh.is_empty() {
        return Ok(0);
    }

    store
        .update(|db| {
            let before = db.users.len();
            for user in fresh {
                if !db.users.iter().any(|u| u.username == user.username) {
                    info!(username = %user.username, role = ?user.role, "seeded user");
                    db.users.push(user);
                }
            }
            Ok::<_, AuthError>(db.users.len() - before)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(name: &str, password: &str, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            password_hash: hash_password(password).unwrap(),
            role,
        }
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "plain-text"));
    }

    #[test]
    fn authenticate_by_name_and_password() {
        let users = vec![user("alice", "pw", Role::Ceo), user("bob", "pw2", Role::Assistant)];
        let ctx = authenticate(&users, "bob", "pw2").unwrap();
        assert_eq!(ctx.role, Role::Assistant);
        assert!(authenticate(&users, "bob", "pw").is_none());
        assert!(authenticate(&users, "carol", "pw").is_none());
    }

    #[test]
    fn role_check() {
        let ctx = AuthContext::from(&user("alice", "pw", Role::Ceo));
        assert!(ctx.require_role(Role::Ceo).is_ok());
        assert!(matches!(ctx.require_role(Role::Assistant), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn sessions_round_trip() {
        let sessions = SessionStore::default();
        let ctx = AuthContext::from(&user("alice", "pw", Role::Ceo));
        let token = sessions.create(ctx.clone());
        assert_eq!(sessions.get(&token), Some(ctx));
        assert!(sessions.remove(&token).is_some());
        assert_eq!(sessions.get(&token), None);
    }

    #[test]
    fn token_is_read_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; taskboard_session=abc123; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn expired_sessions_are_rejected_and_pruned() {
        let ctx = AuthContext::from(&user("alice", "pw", Role::Ceo));

        let short = SessionStore::new(Duration::ZERO);
        let stale = short.create(ctx.clone());
        assert_eq!(short.get(&stale), None);
        let also_stale = short.create(ctx.clone());
        // the first entry was dropped when the second was created
        assert_eq!(short.len(), 1);
        assert_eq!(short.get(&also_stale), None);

        let long = SessionStore::default();
        assert_eq!(long.ttl(), DEFAULT_SESSION_TTL);
        let token = long.create(ctx.clone());
        assert_eq!(long.get(&token), Some(ctx));
    }

    #[tokio::test]
    async fn blocking_helpers_match_inline_versions() {
        let hash = hash_password_blocking("pw".to_string()).await.unwrap();
        assert!(verify_password("pw", &hash));

        let users = vec![user("alice", "pw", Role::Ceo)];
        let ctx = authenticate_blocking(users.clone(), "alice".into(), "pw".into())
            .await
            .unwrap();
        assert_eq!(ctx.map(|c| c.username), Some("alice".to_string()));
        let none = authenticate_blocking(users, "alice".into(), "nope".into())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn cookie_flags() {
        let day = Duration::from_secs(86_400);
        assert!(!session_cookie("t", false, day).contains("Secure"));
        assert!(session_cookie("t", false, day).contains("Max-Age=86400"));
        assert!(session_cookie("t", true, day).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn seeding_skips_existing_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("db.json"));
        let seeds = vec![SeedUser {
            username: "alice".to_string(),
            role: Role::Ceo,
            password: "pw".to_string(),
        }];

        assert_eq!(seed_users(&store, &seeds).await.unwrap(), 1);
        assert_eq!(seed_users(&store, &seeds).await.unwrap(), 0);
        assert_eq!(store.load().unwrap().users.len(), 1);
    }
}
