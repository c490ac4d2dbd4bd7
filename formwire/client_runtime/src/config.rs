use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::protocol::PROTOCOL_VERSION;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ENCODING: &str = "EUC-JP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub save_password: bool,
    pub application: String,
    pub cache_dir: PathBuf,
    pub protocol_version: String,
    /// WHATWG label of the text encoding used for strings on the wire.
    pub encoding: String,
    pub use_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: std::env::var("USER").unwrap_or_default(),
            password: String::new(),
            save_password: false,
            application: "demo".to_string(),
            cache_dir: default_cache_dir(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            use_tls: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".formwire")
        .join("cache")
}

impl ClientConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "reading config",
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the config as pretty JSON. The password is kept only when
    /// `save_password` is set.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source: io::Error| ConfigError::Io {
            operation: "writing config",
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut stored = self.clone();
        if !stored.save_password {
            stored.password.clear();
        }

        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, &stored)
            .map_err(io::Error::from)
            .map_err(io_error)?;
        writer.write_all(b"\n").map_err(io_error)?;
        writer.flush().map_err(io_error)?;

        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("FORMWIRE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("FORMWIRE_PORT").and_then(|port| port.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(user) = lookup("FORMWIRE_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("FORMWIRE_PASSWORD") {
            self.password = password;
        }
        if let Some(application) = lookup("FORMWIRE_APPLICATION") {
            self.application = application;
        }
        if let Some(dir) = lookup("FORMWIRE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(encoding) = lookup("FORMWIRE_ENCODING") {
            self.encoding = encoding;
        }
        if let Some(use_tls) = lookup("FORMWIRE_TLS").and_then(|flag| parse_flag(&flag)) {
            self.use_tls = use_tls;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.application.trim().is_empty() {
            return Err(ConfigError::Invalid("application must not be empty".to_string()));
        }
        self.text_encoding()?;
        Ok(())
    }

    pub fn text_encoding(&self) -> Result<&'static Encoding, ConfigError> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| ConfigError::Invalid(format!("unknown text encoding `{}`", self.encoding)))
    }

    pub fn cache_file(&self, screen: &str) -> PathBuf {
        crate::cache::ScreenCache::new(&self.cache_dir, &self.host, self.port).path_for(screen)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
