use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub sms_gateway_url: String,
    pub sms_gateway_api_key: String,
    pub default_consultation_minutes: i64,
    pub eta_buffer_percent: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            sms_gateway_url: env::var("SMS_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("SMS_GATEWAY_URL not set, SMS notifications disabled");
                    String::new()
                }),
            sms_gateway_api_key: env::var("SMS_GATEWAY_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("SMS_GATEWAY_API_KEY not set, using empty value");
                    String::new()
                }),
            default_consultation_minutes: env::var("DEFAULT_CONSULTATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            eta_buffer_percent: env::var("ETA_BUFFER_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_gateway_url.is_empty() && !self.sms_gateway_api_key.is_empty()
    }
}
