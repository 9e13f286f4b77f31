use std::path::PathBuf;

pub const HOME_VAR: &str = "STICKYNOTES_HOME";
pub const LOG_VAR: &str = "STICKYNOTES_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the note records and the log file
    pub data_dir: PathBuf,
    /// env_logger filter directives
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup(HOME_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME")
                    .or_else(|| lookup("USERPROFILE"))
                    .unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(".stickynotes")
            });
        let log_filter = lookup(LOG_VAR).unwrap_or_else(|| "info".to_string());

        AppConfig {
            data_dir,
            log_filter,
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("stickynotes.log")
    }
}
