//! Test utilities and fixtures for Soundpay integration tests

#![allow(dead_code)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use soundpay::config::ProviderCredentials;
pub use soundpay::db::{init_db, queries, AppState};
pub use soundpay::email::EmailService;
pub use soundpay::models::*;

/// Create an in-memory test database with schema initialized.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Full application state over a named shared-cache in-memory database, so
/// pooled connections all see the same data. The keepalive connection pins
/// the database for the lifetime of the fixture.
///
/// `name` must be unique per test to avoid cross-test sharing.
pub struct TestApp {
    pub state: AppState,
    _keepalive: Connection,
}

pub fn setup_test_app(name: &str) -> TestApp {
    let uri = format!("file:{}?mode=memory&cache=shared", name);

    let keepalive = Connection::open(&uri).expect("Failed to open shared in-memory database");
    init_db(&keepalive).expect("Failed to initialize schema");

    let manager = SqliteConnectionManager::file(&uri);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .expect("Failed to build test pool");

    let http = reqwest::Client::new();
    let email = EmailService::new(
        http.clone(),
        None, // email disabled in tests
        "Soundpay Test <noreply@test.local>".to_string(),
        "http://localhost:3000".to_string(),
    );

    TestApp {
        state: AppState {
            db: pool,
            http,
            email,
            site_url: "http://localhost:3000".to_string(),
            provider_api_url: "http://localhost:9/v3/payments".to_string(),
            platform_credentials: None,
        },
        _keepalive: keepalive,
    }
}

pub const TEST_ALBUM_ID: &str = "sp_alb_000000000000000000000000000000aa";

/// Insert a test album with a couple of tracks, returning its id.
pub fn create_test_album(conn: &Connection) -> String {
    queries::insert_album(conn, TEST_ALBUM_ID, "Night Drive", "The Harbor Lights")
        .expect("Failed to insert test album");
    queries::insert_track(conn, TEST_ALBUM_ID, "Headlights", 1)
        .expect("Failed to insert test track");
    queries::insert_track(conn, TEST_ALBUM_ID, "Last Exit", 2)
        .expect("Failed to insert test track");
    TEST_ALBUM_ID.to_string()
}

/// Create a pending order for the test album.
pub fn create_test_order(conn: &Connection, album_id: &str, email: &str, amount: f64) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            album_id: album_id.to_string(),
            customer_email: email.to_string(),
            billing_name: None,
            billing_phone: None,
            amount,
            currency: "RUB".to_string(),
            seller_id: None,
        },
    )
    .expect("Failed to create test order")
}
