use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub store_namespace: String,
    pub whatsapp_api_url: String,
    pub whatsapp_access_token: String,
    pub whatsapp_phone_number_id: String,
    pub default_country_code: String,
    /// Upper bound on one WhatsApp API call, connect to last byte.
    pub whatsapp_timeout_secs: u64,
    pub slot_transaction_retries: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            store_namespace: env::var("STORE_NAMESPACE")
                .unwrap_or_else(|_| "hospital".to_string()),
            whatsapp_api_url: env::var("WHATSAPP_API_URL")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_API_URL not set, using default");
                    "https://graph.facebook.com/v19.0".to_string()
                }),
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_ACCESS_TOKEN not set, using empty value");
                    String::new()
                }),
            whatsapp_phone_number_id: env::var("WHATSAPP_PHONE_NUMBER_ID")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_PHONE_NUMBER_ID not set, using empty value");
                    String::new()
                }),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|_| "91".to_string()),
            whatsapp_timeout_secs: parse_or_default("WHATSAPP_TIMEOUT_SECS", 10),
            slot_transaction_retries: parse_or_default("SLOT_TRANSACTION_RETRIES", 3),
            port: parse_or_default("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, bookings will be kept in process memory");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_messaging_configured(&self) -> bool {
        !self.whatsapp_api_url.is_empty()
            && !self.whatsapp_access_token.is_empty()
            && !self.whatsapp_phone_number_id.is_empty()
    }
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            redis_url: None,
            store_namespace: "hospital".to_string(),
            whatsapp_api_url: "https://graph.facebook.com/v19.0".to_string(),
            whatsapp_access_token: String::new(),
            whatsapp_phone_number_id: String::new(),
            default_country_code: "91".to_string(),
            whatsapp_timeout_secs: 10,
            slot_transaction_retries: 3,
            port: 3000,
        }
    }
}
