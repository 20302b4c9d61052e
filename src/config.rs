use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Default page size for history fetches when the client omits `limit`.
    pub history_page_size: i64,
    /// Hard cap on `limit` regardless of what the client asks for.
    pub history_page_max: i64,
    /// WebSocket ping interval in seconds.
    pub ws_heartbeat_secs: u64,
    /// Seconds of silence after which a connection is considered dead. A dead
    /// connection is unregistered and leaves all of its rooms, which is what
    /// reaps rooms abandoned by abrupt network loss.
    pub ws_client_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let history_page_size = env::var("HISTORY_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);
        let history_page_max = env::var("HISTORY_PAGE_MAX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);
        let ws_heartbeat_secs = env::var("WS_HEARTBEAT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let ws_client_timeout_secs = env::var("WS_CLIENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        if history_page_size < 1 || history_page_size > history_page_max {
            return Err(crate::error::AppError::Config(
                "HISTORY_PAGE_SIZE must be between 1 and HISTORY_PAGE_MAX".into(),
            ));
        }

        Ok(Self {
            database_url,
            port,
            history_page_size,
            history_page_max,
            ws_heartbeat_secs,
            ws_client_timeout_secs,
        })
    }
}

impl Default for Config {
    /// Defaults used by tests that never touch the database.
    fn default() -> Self {
        Self {
            database_url: String::new(),
            port: 5000,
            history_page_size: 50,
            history_page_max: 200,
            ws_heartbeat_secs: 5,
            ws_client_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.history_page_size, 50);
        assert!(cfg.history_page_size <= cfg.history_page_max);
        assert!(cfg.ws_heartbeat_secs < cfg.ws_client_timeout_secs);
    }
}
