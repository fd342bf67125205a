use std::env;

/// Platform-level payment provider credentials (Basic auth pair).
/// Used when the order's seller has no configuration of their own.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub shop_id: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Storefront URL used as the default post-payment redirect target.
    pub site_url: String,
    pub provider_api_url: String,
    pub platform_credentials: Option<ProviderCredentials>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SOUNDPAY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let platform_credentials = match (
            env::var("YOOKASSA_SHOP_ID").ok().map(|s| s.trim().to_string()),
            env::var("YOOKASSA_SECRET_KEY").ok().map(|s| s.trim().to_string()),
        ) {
            (Some(shop_id), Some(secret_key))
                if !shop_id.is_empty() && !secret_key.is_empty() =>
            {
                Some(ProviderCredentials { shop_id, secret_key })
            }
            _ => None,
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "soundpay.db".to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| base_url.clone()),
            base_url,
            provider_api_url: env::var("YOOKASSA_API_URL")
                .unwrap_or_else(|_| "https://api.yookassa.ru/v3/payments".to_string()),
            platform_credentials,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Soundpay <noreply@soundpay.local>".to_string()),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
