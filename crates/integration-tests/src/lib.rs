//! Integration test harness for Hearth.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p hearth-integration-tests
//! ```
//!
//! No database is needed: [`TestApp::spawn`] serves the real pipeline on an
//! ephemeral port with an in-memory session store and an in-memory user
//! directory. The database handle is created lazily and never connects.
//!
//! Besides the real routes, the test app mounts a few probe routes:
//!
//! - `GET /fail` - fails with "db write failed"
//! - `GET /panic` - panics with "boom"
//! - `GET /db-fail` - fails with a database error mentioning [`DB_FAIL_DETAIL`]
//! - `GET /unavailable` - answers a bare 503, with no failure attached
//! - `DELETE /override-probe` - reports the method seen by the route

#![allow(clippy::unwrap_used, clippy::missing_panics_doc, clippy::expect_used)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    http::{StatusCode, request::Parts},
    routing::{delete, get},
};
use chrono::Utc;
use hearth_core::{OperatingMode, UserId, Username};
use hearth_web::config::{AppConfig, DEFAULT_BODY_LIMIT_BYTES, SentryConfig};
use hearth_web::db::{Database, RepositoryError, UserDirectory};
use hearth_web::error::AppError;
use hearth_web::middleware::OriginalMethod;
use hearth_web::models::User;
use hearth_web::services::auth::hash_password;
use hearth_web::state::{AppState, Lifecycle, LifecycleError};
use hearth_web::{pipeline, routes, shutdown};
use reqwest::{Client, redirect};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_sessions::MemoryStore;

/// Message of the failure raised by `GET /fail`.
pub const FAIL_MESSAGE: &str = "db write failed";

/// Internal detail carried by the failure raised by `GET /db-fail`.
pub const DB_FAIL_DETAIL: &str = "user row 7 unreadable";

/// Password given to users created with [`MemoryUsers::add`].
pub const TEST_PASSWORD: &str = "correct horse battery";

/// In-memory user directory.
#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<(User, String)>>,
}

impl MemoryUsers {
    /// Add a user with [`TEST_PASSWORD`].
    pub fn add(&self, username: &str) -> User {
        let mut rows = self.rows.lock().unwrap();
        let user = User {
            id: UserId::new(i32::try_from(rows.len()).unwrap() + 1),
            username: Username::parse(username).unwrap(),
            created_at: Utc::now(),
        };
        rows.push((user.clone(), hash_password(TEST_PASSWORD).unwrap()));
        user
    }

    /// Delete a user, leaving any session that references it stale.
    pub fn remove(&self, id: UserId) {
        self.rows.lock().unwrap().retain(|(user, _)| user.id != id);
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()))
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|(u, _)| &u.username == username).cloned())
    }

    async fn create(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|(u, _)| &u.username == username) {
            return Err(RepositoryError::Conflict("username already exists".to_owned()));
        }
        let user = User {
            id: UserId::new(i32::try_from(rows.len()).unwrap() + 1),
            username: username.clone(),
            created_at: Utc::now(),
        };
        rows.push((user.clone(), password_hash.to_owned()));
        Ok(user)
    }
}

/// Knobs for [`TestApp::spawn_with`].
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub mode: OperatingMode,
    pub body_limit_bytes: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Development,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// Path of the web crate's public directory.
#[must_use]
pub fn public_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/public")
}

/// Configuration for a test app.
#[must_use]
pub fn test_config(options: &TestOptions) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://hearth@127.0.0.1:1/hearth"),
        mode: options.mode.clone(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        session_secret: SecretString::from("kN3v8qLx2ZpR7wYt5HcJ9mBd4FgS6uAe"),
        public_dir: public_dir(),
        body_limit_bytes: options.body_limit_bytes,
        json_logs: false,
        sentry: SentryConfig::default(),
    }
}

fn probe_routes() -> Router<AppState> {
    Router::new()
        .route("/fail", get(fail))
        .route("/panic", get(panics))
        .route("/db-fail", get(db_fail))
        .route("/unavailable", get(unavailable))
        .route("/override-probe", delete(override_probe))
}

async fn fail() -> Result<&'static str, AppError> {
    Err(AppError::Unhandled(FAIL_MESSAGE.to_owned()))
}

async fn db_fail() -> Result<&'static str, AppError> {
    Err(AppError::Database(RepositoryError::DataCorruption(
        DB_FAIL_DETAIL.to_owned(),
    )))
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

#[allow(clippy::unused_async)]
async fn panics() -> &'static str {
    panic!("boom")
}

async fn override_probe(parts: Parts) -> String {
    match parts.extensions.get::<OriginalMethod>() {
        Some(OriginalMethod(original)) => format!("{} via {original}", parts.method),
        None => parts.method.to_string(),
    }
}

/// A running app plus a cookie-keeping client pointed at it.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    pub users: Arc<MemoryUsers>,
    pub client: Client,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<io::Result<()>>,
}

impl TestApp {
    /// Spawn an app in development mode.
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    /// Spawn an app in the given mode.
    pub async fn spawn_in(mode: OperatingMode) -> Self {
        Self::spawn_with(TestOptions {
            mode,
            ..TestOptions::default()
        })
        .await
    }

    /// Spawn an app with custom options.
    pub async fn spawn_with(options: TestOptions) -> Self {
        let config = test_config(&options);
        let database = Database::connect_lazy(&config.database_url).unwrap();
        let users = Arc::new(MemoryUsers::default());
        let state = AppState::new(config, database, users.clone());

        let app = pipeline::build(
            &state,
            MemoryStore::default(),
            routes::routes().merge(probe_routes()),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();

        let server_state = state.clone();
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown::drain_on(server_state, async {
                signal.await.ok();
            }))
            .await
        });

        state.advance(Lifecycle::Ready).unwrap();

        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            addr,
            state,
            users,
            client,
            shutdown,
            server,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET `path` and return status and body.
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, String) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    /// Log in as `username` with [`TEST_PASSWORD`].
    pub async fn login(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", TEST_PASSWORD)])
            .send()
            .await
            .unwrap()
    }

    /// Fire the shutdown trigger and wait for in-flight requests to finish.
    ///
    /// The app is left draining, with the database still open.
    pub async fn drain(self) -> AppState {
        self.shutdown.send(()).ok();
        self.server.await.unwrap().unwrap();
        self.state
    }

    /// Drain, then run the shutdown sequence.
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error from [`shutdown::close`].
    pub async fn stop(self) -> Result<(), LifecycleError> {
        let state = self.drain().await;
        shutdown::close(&state).await
    }
}

/// Shared in-memory log sink.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a text subscriber writing into this sink for the current
    /// thread. Logs are captured until the guard is dropped.
    #[must_use]
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything captured so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
