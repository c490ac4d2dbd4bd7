use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::PacketClass;

/// Why the server refused a `Connect` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRejection {
    Refused,
    VersionMismatch,
    AuthError,
    InvalidApplication,
    Unexpected(u8),
}

impl fmt::Display for HandshakeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => f.write_str("cannot connect to server"),
            Self::VersionMismatch => f.write_str("cannot connect to server: version mismatch"),
            Self::AuthError => f.write_str("cannot connect to server: authentication error"),
            Self::InvalidApplication => {
                f.write_str("cannot connect to server: invalid application name")
            }
            Self::Unexpected(byte) => {
                write!(f, "cannot connect to server: other protocol error (0x{byte:02x})")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    #[error("invalid protocol sequence: expected {expected}, got {found:?}")]
    ProtocolSequence {
        expected: &'static str,
        found: PacketClass,
    },

    #[error("unknown packet class 0x{0:02x}")]
    UnknownPacketClass(u8),

    #[error("unknown value type tag 0x{0:02x}")]
    UnknownDataType(u8),

    #[error("unknown window lifecycle kind {0}")]
    UnknownWindowKind(i32),

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("{0}")]
    Handshake(HandshakeRejection),

    #[error("cache I/O error at {path}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("TLS failure: {0}")]
    Tls(#[from] rustls::Error),

    #[error("`{0}` is not a valid TLS server name")]
    InvalidServerName(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session already ended")]
    SessionEnded,
}

impl ClientError {
    #[must_use]
    pub fn cache_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn sequence(expected: &'static str, found: PacketClass) -> Self {
        Self::ProtocolSequence { expected, found }
    }

    /// Fatal errors end the session; the caller decides whether to reconnect.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CacheIo { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
