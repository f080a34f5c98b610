use std::path::PathBuf;

/// Runtime configuration, environment-backed with development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("FOUNDLING_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_path: std::env::var("FOUNDLING_DB")
                .unwrap_or_else(|_| "./data/foundling.sqlite3".to_string())
                .into(),
            uploads_dir: std::env::var("FOUNDLING_UPLOADS")
                .unwrap_or_else(|_| "./data/uploads".to_string())
                .into(),
            admin_username: std::env::var("FOUNDLING_ADMIN_USER")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_password: std::env::var("FOUNDLING_ADMIN_PASSWORD")
                .unwrap_or_else(|_| "development-password-change-me".to_string()),
        }
    }
}
