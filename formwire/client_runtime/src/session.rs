use std::collections::BTreeMap;
use std::io::{Read, Write};

use encoding_rs::Encoding;
use tracing::{debug, info, warn};

use crate::cache::{CacheState, ScreenCache, ScreenStamp};
use crate::codec;
use crate::error::{ClientError, HandshakeRejection, Result};
use crate::marshal::MarshallerRegistry;
use crate::protocol::{PROTOCOL_VERSION, PacketClass, Transport, WindowKind};
use crate::value::NamePath;
use crate::widget::{ScreenBuilder, WidgetHandle, WidgetTree};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Dropped: the session was applying server data or settling the UI.
    Suppressed,
    Updated,
    WindowsChanged,
    Ended,
}

/// Client side of one protocol session.
///
/// Exchanges are strictly request/response on a single blocking stream.
/// The session owns the transport and every open window; the UI layer
/// reaches windows only through the session.
pub struct Session<S, B: ScreenBuilder> {
    transport: Transport<S>,
    builder: B,
    cache: ScreenCache,
    registry: MarshallerRegistry,
    windows: BTreeMap<String, Window<B::Tree>>,
    protocol_version: String,
    receiving: bool,
    suppress_events: bool,
    first_cycle: bool,
    ended: bool,
}

impl<S: Read + Write, B: ScreenBuilder> Session<S, B> {
    pub fn new(stream: S, builder: B, cache: ScreenCache) -> Self {
        Self {
            transport: Transport::new(stream),
            builder,
            cache,
            registry: MarshallerRegistry::standard(),
            windows: BTreeMap::new(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            receiving: false,
            suppress_events: false,
            first_cycle: true,
            ended: false,
        }
    }

    pub fn with_registry(mut self, registry: MarshallerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.transport.set_encoding(encoding);
        self
    }

    pub fn handshake(&mut self, user: &str, password: &str, application: &str) -> Result<()> {
        self.ensure_open()?;
        info!(user, application, version = %self.protocol_version, "connecting");

        self.transport.send_packet_class(PacketClass::Connect)?;
        self.transport.send_string(&self.protocol_version)?;
        self.transport.send_string(user)?;
        self.transport.send_string(password)?;
        self.transport.send_string(application)?;
        self.transport.flush()?;

        let byte = self.transport.receive_byte()?;
        let rejection = match PacketClass::from_byte(byte) {
            Ok(PacketClass::Ok) => {
                info!(application, "connected");
                return Ok(());
            }
            Ok(PacketClass::Not) => HandshakeRejection::Refused,
            Ok(PacketClass::VersionMismatch) => HandshakeRejection::VersionMismatch,
            Ok(PacketClass::AuthError) => HandshakeRejection::AuthError,
            Ok(PacketClass::InvalidApplication) => HandshakeRejection::InvalidApplication,
            _ => HandshakeRejection::Unexpected(byte),
        };
        warn!(%rejection, "handshake rejected");
        Err(ClientError::Handshake(rejection))
    }

    /// Answers `QueryScreen` frames until the server sends anything else.
    ///
    /// Stale definitions are downloaded and any window built from them is
    /// torn down. With `init`, the first queried screen is opened as a new
    /// window.
    pub fn check_screens(&mut self, init: bool) -> Result<Vec<(String, CacheState)>> {
        self.ensure_open()?;
        let mut init = init;
        let mut outcomes = Vec::new();

        loop {
            let class = self.transport.receive_packet_class()?;
            if class != PacketClass::QueryScreen {
                debug!(?class, "screen check finished");
                break;
            }

            let screen = self.transport.receive_string()?;
            let size = self.transport.receive_long()?;
            let mtime = self.transport.receive_long()?;
            debug!(screen = %screen, size, mtime, "query screen");

            let state =
                self.cache
                    .ensure_fresh(&mut self.transport, &screen, ScreenStamp { size, mtime })?;
            if state != CacheState::Fresh {
                self.destroy_window(&screen);
            }
            if init {
                self.show_window(&screen, WindowKind::New);
                init = false;
            }
            outcomes.push((screen, state));
        }

        Ok(outcomes)
    }

    /// One full cycle: validate cached screens, pull data for every window
    /// the server announces, apply focus, reset the idle timer.
    ///
    /// Returns true when the server opened, closed, joined or changed a
    /// window during the cycle.
    pub fn get_screen_data(&mut self) -> Result<bool> {
        self.ensure_open()?;
        self.receiving = true;
        let result = self.screen_data_cycle();
        self.receiving = false;
        result
    }

    fn screen_data_cycle(&mut self) -> Result<bool> {
        let init = std::mem::replace(&mut self.first_cycle, false);
        self.check_screens(init)?;

        self.transport.send_packet_class(PacketClass::GetData)?;
        // Partial fetch is reserved by the protocol; 0 always requests every field.
        self.transport.send_long(0)?;
        self.transport.flush()?;

        let mut stop = false;
        let mut last_window = None;
        let mut class = self.transport.receive_packet_class()?;

        while class == PacketClass::WindowName {
            let name = self.transport.receive_string()?;
            let kind = WindowKind::from_wire(self.transport.receive_int()?)?;
            debug!(window = %name, ?kind, "window announced");

            if kind == WindowKind::EndSession {
                info!("server ended the session");
                self.end()?;
                return Ok(false);
            }

            stop |= kind.stops_cycle();
            self.show_window(&name, kind);

            class = self.transport.receive_packet_class()?;
            if class == PacketClass::ScreenData {
                if !kind.carries_data() {
                    return Err(ClientError::sequence("window terminator", class));
                }
                self.receive_window_data(&name)?;
                class = self.transport.receive_packet_class()?;
            }
            last_window = Some(name);
        }

        if class == PacketClass::FocusName {
            let window = self.transport.receive_string()?;
            let widget = self.transport.receive_string()?;
            self.focus(&window, &widget);
            last_window = Some(window);
            let terminator = self.transport.receive_packet_class()?;
            debug!(?terminator, "focus frame closed");
        } else {
            debug!(?class, "data pull finished");
        }

        if let Some(name) = last_window {
            if let Some(window) = self.windows.get_mut(&name) {
                self.builder.reset_timer(&name, window.tree_mut());
            }
        }

        Ok(stop)
    }

    fn receive_window_data(&mut self, name: &str) -> Result<()> {
        let path = NamePath::root(name);
        match self.windows.get_mut(name) {
            Some(window) => {
                let model = codec::decode_value(
                    &mut self.transport,
                    &path,
                    window.tree_mut(),
                    &self.registry,
                )?;
                window.set_model(model);
            }
            None => {
                warn!(window = name, "screen data for a window that is not open; skipped");
                codec::skip_value(&mut self.transport)?;
            }
        }
        Ok(())
    }

    fn show_window(&mut self, name: &str, kind: WindowKind) {
        match kind {
            WindowKind::New | WindowKind::Current => {
                if !self.windows.contains_key(name) {
                    let definition = self.cache.path_for(name);
                    match self.builder.build(&definition, name) {
                        Ok(tree) => {
                            info!(window = name, "window created");
                            self.windows
                                .insert(name.to_string(), Window::new(name, tree));
                        }
                        Err(reason) => {
                            warn!(window = name, %reason, "failed to build window");
                            return;
                        }
                    }
                }
                if let Some(window) = self.windows.get_mut(name) {
                    self.builder.show(name, window.tree_mut());
                }
            }
            WindowKind::Close => self.destroy_window(name),
            _ => {}
        }
    }

    fn destroy_window(&mut self, name: &str) {
        if let Some(window) = self.windows.remove(name) {
            let mut tree = window.into_tree();
            self.builder.hide(name, &mut tree);
            info!(window = name, "window destroyed");
        }
    }

    fn focus(&mut self, window: &str, widget: &str) {
        let Some(target) = self.windows.get_mut(window) else {
            warn!(window, widget, "focus requested for a window that is not open");
            return;
        };
        match target.tree().resolve(widget) {
            Some(handle) => target.tree_mut().focus(handle),
            None => warn!(window, widget, "focus target not found"),
        }
    }

    /// Records a local edit. Ignored while server data is being applied.
    pub fn mark_dirty(&mut self, window: &str, path: &str, widget: WidgetHandle) -> bool {
        if self.receiving {
            return false;
        }
        match self.windows.get_mut(window) {
            Some(target) => target.dirty_mut().insert(path, widget),
            None => {
                warn!(window, path, "edit for a window that is not open");
                false
            }
        }
    }

    pub fn mark_widget_dirty(&mut self, window: &str, widget: WidgetHandle) -> bool {
        let path = self
            .windows
            .get(window)
            .and_then(|target| target.tree().long_name_of(widget));
        match path {
            Some(path) => self.mark_dirty(window, &path, widget),
            None => false,
        }
    }

    /// Sends every pending edit, one `WindowName ... End` block per window
    /// that has edits, followed by a closing `End`.
    pub fn flush_all(&mut self) -> Result<()> {
        self.ensure_open()?;

        for (name, window) in &mut self.windows {
            if window.dirty().is_empty() {
                continue;
            }

            self.transport.send_packet_class(PacketClass::WindowName)?;
            self.transport.send_string(name)?;
            for (path, handle) in window.dirty().iter() {
                match self.registry.encode(window.tree(), handle) {
                    Some(value) => {
                        codec::encode_value(&mut self.transport, &value, &NamePath::parse(path), true)?;
                    }
                    None => warn!(window = %name, path, "widget has no value to send"),
                }
            }
            self.transport.send_packet_class(PacketClass::End)?;
            window.dirty_mut().clear();
        }

        self.transport.send_packet_class(PacketClass::End)?;
        self.transport.flush()
    }

    pub fn send_event(&mut self, window: &str, widget: &str, event: &str) -> Result<EventOutcome> {
        self.ensure_open()?;
        if self.receiving || self.suppress_events {
            debug!(window, widget, event, "event suppressed");
            return Ok(EventOutcome::Suppressed);
        }

        debug!(window, widget, event, "sending event");
        self.transport.send_packet_class(PacketClass::Event)?;
        self.transport.send_string(window)?;
        self.transport.send_string(widget)?;
        self.transport.send_string(event)?;
        self.flush_all()?;

        let changed = self.get_screen_data()?;
        if self.ended {
            return Ok(EventOutcome::Ended);
        }
        if !changed {
            return Ok(EventOutcome::Updated);
        }

        self.suppress_events = true;
        self.builder.settle();
        self.suppress_events = false;
        Ok(EventOutcome::WindowsChanged)
    }

    pub fn run_until_end(&mut self) -> Result<()> {
        while !self.ended {
            self.get_screen_data()?;
        }
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        self.windows.clear();
        self.transport.send_packet_class(PacketClass::End)?;
        self.transport.flush()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.ended {
            Err(ClientError::SessionEnded)
        } else {
            Ok(())
        }
    }

    pub fn window(&self, name: &str) -> Option<&Window<B::Tree>> {
        self.windows.get(name)
    }

    pub fn window_mut(&mut self, name: &str) -> Option<&mut Window<B::Tree>> {
        self.windows.get_mut(name)
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window<B::Tree>> {
        self.windows.values()
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut B {
        &mut self.builder
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    pub fn events_suppressed(&self) -> bool {
        self.suppress_events
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn cache(&self) -> &ScreenCache {
        &self.cache
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn into_stream(self) -> S {
        self.transport.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_value;
    use crate::value::Value;
    use crate::widget::{WidgetKind, WidgetValue};
    use std::collections::HashMap;
    use std::io::{self, Cursor};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FormTree {
        names: Vec<(String, WidgetKind)>,
        state: HashMap<WidgetHandle, WidgetValue>,
        focused: Option<WidgetHandle>,
    }

    impl WidgetTree for FormTree {
        fn resolve(&self, path: &str) -> Option<WidgetHandle> {
            self.names
                .iter()
                .position(|(name, _)| name == path)
                .map(WidgetHandle)
        }

        fn kind(&self, handle: WidgetHandle) -> Option<WidgetKind> {
            self.names.get(handle.0).map(|(_, kind)| *kind)
        }

        fn long_name_of(&self, handle: WidgetHandle) -> Option<String> {
            self.names.get(handle.0).map(|(name, _)| name.clone())
        }

        fn focus(&mut self, handle: WidgetHandle) {
            self.focused = Some(handle);
        }

        fn apply(&mut self, handle: WidgetHandle, value: WidgetValue) {
            self.state.insert(handle, value);
        }

        fn current(&self, handle: WidgetHandle) -> Option<WidgetValue> {
            self.state.get(&handle).cloned()
        }
    }

    #[derive(Default)]
    struct Builder {
        built: Vec<String>,
        hidden: Vec<String>,
        timers: Vec<String>,
        settled: usize,
    }

    impl ScreenBuilder for Builder {
        type Tree = FormTree;

        fn build(&mut self, _definition: &Path, window: &str) -> std::result::Result<FormTree, String> {
            self.built.push(window.to_string());
            Ok(FormTree {
                names: vec![
                    (format!("{window}.field1"), WidgetKind::Entry),
                    (format!("{window}.check"), WidgetKind::CheckButton),
                ],
                ..FormTree::default()
            })
        }

        fn hide(&mut self, window: &str, _tree: &mut FormTree) {
            self.hidden.push(window.to_string());
        }

        fn reset_timer(&mut self, window: &str, _tree: &mut FormTree) {
            self.timers.push(window.to_string());
        }

        fn settle(&mut self) {
            self.settled += 1;
        }
    }

    struct Script {
        out: Transport<Cursor<Vec<u8>>>,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                out: Transport::new(Cursor::new(Vec::new())),
            }
        }
    }

    impl Script {
        fn class(mut self, class: PacketClass) -> Self {
            self.out.send_packet_class(class).expect("class");
            self
        }

        fn window(mut self, name: &str, kind: WindowKind) -> Self {
            self.out.send_packet_class(PacketClass::WindowName).expect("class");
            self.out.send_string(name).expect("name");
            self.out.send_int(kind.to_wire()).expect("kind");
            self
        }

        fn data(mut self, value: &Value) -> Self {
            self.out.send_packet_class(PacketClass::ScreenData).expect("class");
            write_value(&mut self.out, value).expect("value");
            self
        }

        fn focus(mut self, window: &str, widget: &str) -> Self {
            self.out.send_packet_class(PacketClass::FocusName).expect("class");
            self.out.send_string(window).expect("window");
            self.out.send_string(widget).expect("widget");
            self
        }

        fn session(self) -> Session<Duplex, Builder> {
            let duplex = Duplex {
                input: Cursor::new(self.out.into_inner().into_inner()),
                output: Vec::new(),
            };
            Session::new(duplex, Builder::default(), ScreenCache::in_dir("/nonexistent"))
        }
    }

    fn record(field: &str, value: Value) -> Value {
        Value::Record(vec![(field.to_string(), value)])
    }

    fn sent(session: Session<Duplex, Builder>) -> Vec<u8> {
        session.into_stream().output
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    fn captured<T>(run: impl FnOnce() -> T) -> (T, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, run);
        (result, logs.text())
    }

    #[test]
    fn handshake_rejections_are_specific() {
        for (class, rejection) in [
            (PacketClass::Not, HandshakeRejection::Refused),
            (PacketClass::VersionMismatch, HandshakeRejection::VersionMismatch),
            (PacketClass::AuthError, HandshakeRejection::AuthError),
            (PacketClass::InvalidApplication, HandshakeRejection::InvalidApplication),
            (PacketClass::End, HandshakeRejection::Unexpected(0xFF)),
        ] {
            let mut session = Script::default().class(class).session();
            match session.handshake("u", "p", "app") {
                Err(ClientError::Handshake(found)) => assert_eq!(found, rejection),
                other => panic!("expected handshake rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn handshake_sends_connect_frame() {
        let mut session = Script::default().class(PacketClass::Ok).session();
        session.handshake("u", "p", "app").expect("handshake");

        let mut expected = vec![PacketClass::Connect.to_byte()];
        expected.extend_from_slice(b"1.1.2\nu\np\napp\n");
        assert_eq!(sent(session), expected);
    }

    #[test]
    fn close_removes_window_without_expecting_data() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("w", WindowKind::New)
            .class(PacketClass::Not)
            .class(PacketClass::End)
            .window("w", WindowKind::Close)
            .class(PacketClass::End)
            .session();

        assert!(session.get_screen_data().expect("first cycle"));
        assert!(session.window("w").is_some());

        assert!(session.get_screen_data().expect("second cycle"));
        assert!(session.window("w").is_none());
        assert_eq!(session.builder().hidden, vec!["w".to_string()]);
    }

    #[test]
    fn current_window_does_not_stop_the_cycle() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::Current)
            .data(&record("field1", Value::VarChar("x".to_string())))
            .class(PacketClass::Not)
            .session();

        assert!(!session.get_screen_data().expect("cycle"));
        assert_eq!(session.builder().timers, vec!["main".to_string()]);
    }

    #[test]
    fn data_for_unknown_window_is_skipped() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("ghost", WindowKind::Change)
            .data(&record("a", Value::Int(1)))
            .class(PacketClass::Not)
            .session();

        assert!(session.get_screen_data().expect("cycle"));
        assert!(session.window("ghost").is_none());
        assert!(!session.is_receiving());
    }

    #[test]
    fn screen_data_after_close_is_a_sequence_error() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("w", WindowKind::Close)
            .data(&Value::Int(1))
            .session();

        assert!(matches!(
            session.get_screen_data(),
            Err(ClientError::ProtocolSequence { .. })
        ));
    }

    #[test]
    fn focus_frame_reaches_the_widget_tree() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::New)
            .data(&record("field1", Value::VarChar("one".to_string())))
            .focus("main", "main.check")
            .class(PacketClass::End)
            .class(PacketClass::End)
            .window("main", WindowKind::Current)
            .data(&record("field1", Value::VarChar("two".to_string())))
            .class(PacketClass::Not)
            .session();

        session.get_screen_data().expect("first cycle");
        let tree = session.window("main").expect("window").tree();
        assert_eq!(tree.focused, Some(WidgetHandle(1)));

        assert!(!session.get_screen_data().expect("second cycle"));
        let tree = session.window("main").expect("window").tree();
        assert_eq!(
            tree.current(WidgetHandle(0)),
            Some(WidgetValue::Text("two".to_string()))
        );
        assert_eq!(session.builder().timers, vec!["main".to_string(), "main".to_string()]);
    }

    #[test]
    fn end_session_sends_end_and_closes() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::EndSession)
            .session();

        assert!(!session.get_screen_data().expect("cycle"));
        assert!(session.is_ended());
        assert!(matches!(
            session.get_screen_data(),
            Err(ClientError::SessionEnded)
        ));

        let output = sent(session);
        assert_eq!(output.last(), Some(&PacketClass::End.to_byte()));
    }

    #[test]
    fn edits_while_receiving_are_ignored() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::New)
            .class(PacketClass::Not)
            .session();
        session.get_screen_data().expect("cycle");

        session.receiving = true;
        assert!(!session.mark_dirty("main", "main.field1", WidgetHandle(0)));
        session.receiving = false;
        assert!(session.window("main").expect("window").dirty().is_empty());

        let before = session.transport().get_ref().output.len();
        session.flush_all().expect("flush");
        let output = sent(session);
        assert_eq!(&output[before..], &[PacketClass::End.to_byte()]);
    }

    #[test]
    fn flush_encodes_dirty_fields_per_window() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::New)
            .data(&Value::Record(vec![
                ("field1".to_string(), Value::VarChar("a b".to_string())),
                (
                    "check".to_string(),
                    record("isactive", Value::Bool(true)),
                ),
            ]))
            .class(PacketClass::Not)
            .session();
        session.get_screen_data().expect("cycle");

        assert!(session.mark_widget_dirty("main", WidgetHandle(0)));
        assert!(session.mark_dirty("main", "main.check", WidgetHandle(1)));
        assert!(!session.mark_dirty("main", "main.check", WidgetHandle(1)));

        let before = session.transport().get_ref().output.len();
        session.flush_all().expect("flush");
        assert!(session.window("main").expect("window").dirty().is_empty());

        let mut expected = vec![PacketClass::WindowName.to_byte()];
        expected.extend_from_slice(b"main\nmain.field1.value: a+b\nmain.check.isactive: T\n");
        expected.push(PacketClass::End.to_byte());
        expected.push(PacketClass::End.to_byte());
        assert_eq!(&sent(session)[before..], expected.as_slice());
    }

    #[test]
    fn unencodable_dirty_widget_is_skipped_with_a_warning() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::New)
            .class(PacketClass::Not)
            .session()
            .with_registry(MarshallerRegistry::empty());
        session.get_screen_data().expect("cycle");
        assert!(session.mark_widget_dirty("main", WidgetHandle(0)));

        let before = session.transport().get_ref().output.len();
        let (flushed, logs) = captured(|| session.flush_all());
        flushed.expect("flush");
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("widget has no value to send"), "{logs}");

        let mut expected = vec![PacketClass::WindowName.to_byte()];
        expected.extend_from_slice(b"main\n");
        expected.push(PacketClass::End.to_byte());
        expected.push(PacketClass::End.to_byte());
        assert_eq!(&sent(session)[before..], expected.as_slice());
    }

    #[test]
    fn event_round_trip_settles_after_window_change() {
        let mut session = Script::default()
            .class(PacketClass::End)
            .window("main", WindowKind::New)
            .class(PacketClass::Not)
            .class(PacketClass::End)
            .window("next", WindowKind::New)
            .class(PacketClass::Not)
            .session();
        session.get_screen_data().expect("first cycle");

        let outcome = session
            .send_event("main", "main.ok", "CLICKED")
            .expect("event");

        assert_eq!(outcome, EventOutcome::WindowsChanged);
        assert_eq!(session.builder().settled, 1);
        assert!(!session.events_suppressed());
        assert!(session.window("next").is_some());
    }

    #[test]
    fn events_are_suppressed_while_settling() {
        let mut session = Script::default().session();
        session.suppress_events = true;
        assert_eq!(
            session.send_event("main", "main.ok", "CLICKED").expect("event"),
            EventOutcome::Suppressed
        );
        session.suppress_events = false;
        assert!(sent(session).is_empty());
    }
}
