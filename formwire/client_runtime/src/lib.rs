pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod marshal;
pub mod net;
pub mod protocol;
pub mod session;
pub mod value;
pub mod widget;
pub mod window;

use tracing::info;

pub use crate::cache::{CacheState, ScreenCache, ScreenStamp};
pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, ConfigError, HandshakeRejection, Result};
pub use crate::marshal::{Marshaller, MarshallerRegistry};
pub use crate::net::Connection;
pub use crate::protocol::{PROTOCOL_VERSION, PacketClass, Transport, WindowKind};
pub use crate::session::{EventOutcome, Session};
pub use crate::value::{NamePath, Value};
pub use crate::widget::{ScreenBuilder, WidgetHandle, WidgetKind, WidgetTree, WidgetValue};
pub use crate::window::{DirtySet, Window};
pub use serde_json;

/// Opens a session to the configured server and completes the handshake.
pub fn connect<B: ScreenBuilder>(config: &ClientConfig, builder: B) -> Result<Session<Connection, B>> {
    let encoding = config.text_encoding()?;
    info!(host = %config.host, port = config.port, tls = config.use_tls, "opening connection");
    let stream = Connection::open(&config.host, config.port, config.use_tls)?;

    let cache = ScreenCache::new(&config.cache_dir, &config.host, config.port);
    let mut session = Session::new(stream, builder, cache)
        .with_protocol_version(&config.protocol_version)
        .with_encoding(encoding);
    session.handshake(&config.user, &config.password, &config.application)?;
    Ok(session)
}

impl<B: ScreenBuilder> Session<Connection, B> {
    pub fn close(mut self) -> Result<()> {
        self.end()?;
        self.into_stream().shutdown()?;
        Ok(())
    }
}
