use anyhow::{anyhow, Context, Result};
use common_crypto::SecretString;
use std::collections::HashMap;
use std::env;

use crate::cliq::CliqChannel;

pub const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
pub const DEFAULT_CLIQ_BASE_URL: &str = "https://cliq.zoho.com";
pub const MAX_EXPIRY_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct RazorpayCredentials {
    pub key_id: String,
    pub key_secret: SecretString,
    pub sandbox: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CliqConfig {
    pub enabled: bool,
    pub base_url: String,
    pub bot_unique_name: Option<String>,
    pub bot_token: Option<SecretString>,
    pub channels: HashMap<CliqChannel, String>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub razorpay: RazorpayCredentials,
    pub razorpay_api_base: String,
    pub webhook_secret: Option<SecretString>,
    pub allow_partial_payments: bool,
    pub default_expiry_days: i64,
    pub virtual_account_prefix: String,
    pub cliq: CliqConfig,
    pub site_url: String,
    pub admin_key_hashes: Vec<String>,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub link_sync_interval_secs: Option<u64>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str| get(key).map(|v| parse_flag(&v)).unwrap_or(false);

        let razorpay = if get("CI").is_some() {
            RazorpayCredentials {
                key_id: get("RZP_SANDBOX_KEY_ID").context("RZP_SANDBOX_KEY_ID must be set under CI")?,
                key_secret: get("RZP_SANDBOX_KEY_SECRET")
                    .context("RZP_SANDBOX_KEY_SECRET must be set under CI")?
                    .into(),
                sandbox: true,
            }
        } else if flag("RAZORPAY_SANDBOX_MODE") {
            RazorpayCredentials {
                key_id: get("RAZORPAY_SANDBOX_KEY_ID").context("RAZORPAY_SANDBOX_KEY_ID must be set in sandbox mode")?,
                key_secret: get("RAZORPAY_SANDBOX_KEY_SECRET")
                    .context("RAZORPAY_SANDBOX_KEY_SECRET must be set in sandbox mode")?
                    .into(),
                sandbox: true,
            }
        } else {
            RazorpayCredentials {
                key_id: get("RAZORPAY_KEY_ID").context("RAZORPAY_KEY_ID must be set")?,
                key_secret: get("RAZORPAY_KEY_SECRET").context("RAZORPAY_KEY_SECRET must be set")?.into(),
                sandbox: false,
            }
        };

        let razorpay_api_base = get("RAZORPAY_API_BASE")
            .unwrap_or_else(|| DEFAULT_RAZORPAY_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let webhook_secret = get("RAZORPAY_WEBHOOK_SECRET").map(SecretString::from);
        let default_expiry_days = get("PAYMENT_LINK_DEFAULT_EXPIRY_DAYS")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(30);

        let channels = CliqChannel::ALL
            .into_iter()
            .filter_map(|channel| get(&channel.env_key()).map(|name| (channel, name)))
            .collect();
        let cliq = CliqConfig {
            enabled: flag("CLIQ_ENABLED"),
            base_url: get("CLIQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CLIQ_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            bot_unique_name: get("CLIQ_BOT_UNIQUE_NAME"),
            bot_token: get("CLIQ_BOT_TOKEN").map(SecretString::from),
            channels,
        };

        let admin_key_hashes = get("ADMIN_API_KEY_SHA256")
            .map(|raw| {
                raw.split(',')
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| anyhow!("PORT is not a valid port: {e}"))?,
            None => 8090,
        };
        let link_sync_interval_secs = get("LINK_SYNC_INTERVAL_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs.max(60));

        Ok(Self {
            razorpay,
            razorpay_api_base,
            webhook_secret,
            allow_partial_payments: flag("PAYMENT_LINK_ALLOW_PARTIAL"),
            default_expiry_days: default_expiry_days.clamp(1, MAX_EXPIRY_DAYS),
            virtual_account_prefix: get("VIRTUAL_ACCOUNT_PREFIX").unwrap_or_default(),
            cliq,
            site_url: get("SITE_URL").unwrap_or_default().trim_end_matches('/').to_string(),
            admin_key_hashes,
            database_url: get("DATABASE_URL"),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            link_sync_interval_secs,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
