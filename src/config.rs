use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub payment: PaymentConfig,
    pub mail: MailConfig,
    pub frontend_url: String,
}

/// Credentials and endpoint for the hosted payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")?;
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let cache_ttl_secs = parse_or("CACHE_TTL_SECS", 300);
        let timeout_secs = parse_or("UPSTREAM_TIMEOUT_SECS", 10);

        let payment = PaymentConfig {
            key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            timeout_secs,
        };
        if payment.key_secret.is_empty() {
            tracing::warn!("RAZORPAY_KEY_SECRET is not set; gateway payments will fail verification");
        }

        let mail = MailConfig {
            relay_url: env::var("MAIL_RELAY_URL").ok().filter(|s| !s.is_empty()),
            from: env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@storefront.local".to_string()),
            timeout_secs,
        };

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            redis_url,
            cache_ttl_secs,
            payment,
            mail,
            frontend_url,
        })
    }
}

fn parse_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
