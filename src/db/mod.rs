mod schema;
pub mod from_row;
pub mod queries;
pub mod retry;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::ProviderCredentials;
use crate::email::EmailService;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every request handler.
///
/// The pool is the single shared mutable resource; everything else is
/// read-only configuration or a cheap-to-clone client handle.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Shared HTTP client for provider calls.
    pub http: reqwest::Client,
    pub email: EmailService,
    /// Storefront URL, default post-payment redirect target.
    pub site_url: String,
    pub provider_api_url: String,
    /// Platform provider account; fallback when the seller has none.
    pub platform_credentials: Option<ProviderCredentials>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
