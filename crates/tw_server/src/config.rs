use std::path::PathBuf;

use anyhow::Context as _;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// TCP port for both the REST API and the WebSocket endpoint.
    pub port: u16,

    /// Simulate an audience so the stream keeps moving with no viewers.
    pub test_mode: bool,

    /// Where the file backend keeps its database.
    pub data_dir: PathBuf,

    /// Newline-delimited dictionary file.
    pub dict_path: PathBuf,

    /// Use the in-memory backend: nothing survives the process.
    pub ephemeral: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5500,
            test_mode: true,
            data_dir: PathBuf::from("data"),
            dict_path: PathBuf::from("data/words.txt"),
            ephemeral: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let port = match std::env::var("HTTP_PORT") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("invalid HTTP_PORT {value:?}"))?,
            Err(_) => defaults.port,
        };

        // `TEST_MODE` is the historical name; the prefixed one wins if both
        // are set.
        let test_mode = env_var_bool("TW_TEST_MODE")
            .or_else(|| env_var_bool("TEST_MODE"))
            .unwrap_or(defaults.test_mode);

        Ok(Self {
            port,
            test_mode,
            data_dir: env_var_path("TW_DATA_DIR").unwrap_or(defaults.data_dir),
            dict_path: env_var_path("TW_DICT_PATH").unwrap_or(defaults.dict_path),
            ephemeral: env_var_bool("TW_EPHEMERAL").unwrap_or(defaults.ephemeral),
        })
    }
}

fn env_var_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}

fn env_var_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|value| match value.to_lowercase().as_str() {
            "0" | "false" | "off" | "no" => Some(false),
            "1" | "true" | "on" | "yes" => Some(true),
            _ => {
                log::warn!(
                    "Invalid value for environment variable {name}={value:?}. \
                     Expected 'on' or 'off'. It will be ignored"
                );
                None
            }
        })
}
