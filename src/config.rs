use std::env;

use anyhow::Context;

use crate::services::i18n::Locale;

/// The hotel operates in Vietnam (GMT+7). Provider timestamps and bill
/// export dates are expressed in this local time.
pub const MERCHANT_UTC_OFFSET_HOURS: i64 = 7;

#[derive(Clone, Debug)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub url: String,
    pub return_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub default_locale: Locale,
    pub admin_token: Option<String>,
    pub vnpay: VnpayConfig,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{key} must be set"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "hotel.db".to_string()),
            default_locale: env::var("DEFAULT_LOCALE")
                .ok()
                .and_then(|v| Locale::parse(&v))
                .unwrap_or(Locale::En),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|v| !v.is_empty()),
            vnpay: VnpayConfig {
                tmn_code: required("VNPAY_TMN_CODE")?,
                hash_secret: required("VNPAY_HASH_SECRET")?,
                url: required("VNPAY_URL")?,
                return_url: required("VNPAY_RETURN_URL")?,
            },
        })
    }
}
