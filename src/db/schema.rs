use rusqlite::Connection;

/// Initialize the database schema.
///
/// The uniqueness constraints on payments(provider, provider_payment_id),
/// webhook_events(provider, event_id) and purchases(customer_email, album_id)
/// are part of the external contract: they are the idempotency mechanism for
/// the whole reconciliation flow, not an incidental detail.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Orders: one row per purchase intent.
        -- status: pending_payment (initial) -> paid | canceled (terminal).
        -- Rows are never deleted; amount is immutable after creation.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            album_id TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            billing_name TEXT,
            billing_phone TEXT,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending_payment'
                CHECK (status IN ('pending_payment', 'paid', 'canceled')),
            seller_id TEXT,
            payment_id TEXT,
            paid_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_payment ON orders(payment_id);
        CREATE INDEX IF NOT EXISTS idx_orders_email ON orders(customer_email);

        -- Payments: one row per provider-side charge attempt.
        -- The (provider, provider_payment_id) key is the upsert boundary for
        -- repeated status reports; the last writer's status fields win.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            provider TEXT NOT NULL,
            provider_payment_id TEXT NOT NULL,
            status TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL,
            last_event TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            UNIQUE(provider, provider_payment_id)
        );
        CREATE INDEX IF NOT EXISTS idx_payments_order ON payments(order_id);

        -- Webhook event ledger: insert-once fencing records.
        -- A second delivery of the same (provider, event_id) is a no-op.
        CREATE TABLE IF NOT EXISTS webhook_events (
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payment_id TEXT NOT NULL,
            received_at INTEGER NOT NULL,

            UNIQUE(provider, event_id)
        );

        -- Purchases: the download grant issued when an order is paid.
        -- Keyed by (customer_email, album_id) so repeat orders for the same
        -- buyer/album converge on one purchase; the token is generated on
        -- first insert only and never changes.
        CREATE TABLE IF NOT EXISTS purchases (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            customer_email TEXT NOT NULL,
            album_id TEXT NOT NULL,
            purchase_token TEXT NOT NULL,
            download_count INTEGER NOT NULL DEFAULT 0,
            last_downloaded_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            UNIQUE(customer_email, album_id)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_purchases_token ON purchases(purchase_token);

        -- Catalog read model (albums/tracks are owned by the storefront;
        -- we only read titles for charge descriptions and emails).
        CREATE TABLE IF NOT EXISTS albums (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            album_id TEXT NOT NULL REFERENCES albums(id),
            title TEXT NOT NULL,
            position INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id, position);

        -- Per-seller provider credentials; platform account is the fallback.
        CREATE TABLE IF NOT EXISTS seller_configs (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            shop_id TEXT NOT NULL,
            secret_key TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            UNIQUE(seller_id, provider)
        );
        "#,
    )
}
