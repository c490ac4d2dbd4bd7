use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::protocol::{MAX_SCREEN_DEFINE_BYTES, PacketClass, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    Refreshed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenStamp {
    pub size: i64,
    /// Seconds since the Unix epoch.
    pub mtime: i64,
}

/// Screen definitions cached under `<cache_dir>/<host>/<port>/<name>`.
#[derive(Debug, Clone)]
pub struct ScreenCache {
    dir: PathBuf,
}

impl ScreenCache {
    pub fn new(cache_dir: impl AsRef<Path>, host: &str, port: u16) -> Self {
        Self::in_dir(
            cache_dir
                .as_ref()
                .join(file_component(host))
                .join(port.to_string()),
        )
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, screen: &str) -> PathBuf {
        self.dir.join(file_component(screen))
    }

    /// A local copy is fresh when it exists, has the reported size, and is
    /// not older than the reported mtime.
    pub fn is_fresh(&self, screen: &str, stamp: ScreenStamp) -> bool {
        let Ok(metadata) = fs::metadata(self.path_for(screen)) else {
            return false;
        };
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |age| age.as_millis() as i128);

        let older = modified_ms < i128::from(stamp.mtime) * 1000;
        let resized = i128::from(metadata.len()) != i128::from(stamp.size);
        !(older || resized)
    }

    pub fn ensure_fresh<S: Read + Write>(
        &self,
        transport: &mut Transport<S>,
        screen: &str,
        stamp: ScreenStamp,
    ) -> Result<CacheState> {
        if self.is_fresh(screen, stamp) {
            debug!(screen, "cached screen is fresh");
            transport.send_packet_class(PacketClass::Not)?;
            transport.flush()?;
            return Ok(CacheState::Fresh);
        }

        self.download(transport, screen)
    }

    pub fn download<S: Read + Write>(
        &self,
        transport: &mut Transport<S>,
        screen: &str,
    ) -> Result<CacheState> {
        transport.send_packet_class(PacketClass::GetScreen)?;
        transport.send_string(screen)?;
        transport.flush()?;

        let class = transport.receive_packet_class()?;
        if class != PacketClass::ScreenDefine {
            return Err(ClientError::sequence("ScreenDefine", class));
        }

        let len = transport.receive_long()?;
        let len = u64::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_SCREEN_DEFINE_BYTES)
            .ok_or(ClientError::FrameTooLarge {
                len: len.unsigned_abs(),
                max: MAX_SCREEN_DEFINE_BYTES,
            })?;

        match self.store(transport, screen, len) {
            Ok(()) => {
                info!(screen, bytes = len, "screen definition downloaded");
                Ok(CacheState::Refreshed)
            }
            Err(ClientError::CacheIo { path, source }) => {
                warn!(screen, path = %path.display(), error = %source, "failed to cache screen definition");
                Ok(CacheState::Failed)
            }
            Err(err) => Err(err),
        }
    }

    /// Streams `len` bytes into `<name>.part`, then renames it into place.
    /// The stream is always drained, even when the local write fails.
    fn store<S: Read>(&self, transport: &mut Transport<S>, screen: &str, len: u64) -> Result<()> {
        let target = self.path_for(screen);
        let partial = self.dir.join(format!("{}.part", file_component(screen)));

        let file = fs::create_dir_all(&self.dir).and_then(|()| File::create(&partial));
        let mut writer = match file {
            Ok(file) => BufWriter::new(file),
            Err(source) => {
                transport.receive_into(len, &mut io::sink())??;
                return Err(ClientError::cache_io(&partial, source));
            }
        };

        let written = transport.receive_into(len, &mut writer)?;
        drop(writer);

        let stored = written.and_then(|()| fs::rename(&partial, &target));
        if let Err(source) = stored {
            let _ = fs::remove_file(&partial);
            return Err(ClientError::cache_io(&target, source));
        }
        Ok(())
    }
}

fn file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, SystemTime};

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

    fn transport(input: Vec<u8>) -> Transport<Duplex> {
        Transport::new(Duplex {
            input: Cursor::new(input),
            output: Vec::new(),
        })
    }

    fn screen_define(body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![PacketClass::ScreenDefine.to_byte()];
        bytes.extend_from_slice(&(body.len() as i64).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn write_cached(cache: &ScreenCache, name: &str, body: &[u8], mtime_secs: u64) {
        fs::create_dir_all(cache.dir()).expect("cache dir");
        let path = cache.path_for(name);
        fs::write(&path, body).expect("write cached screen");
        let file = File::options().write(true).open(&path).expect("open cached");
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
            .expect("set mtime");
    }

    const T: u64 = 1_700_000_000;

    #[test]
    fn matching_size_and_mtime_is_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::new(dir.path(), "localhost", 8000);
        write_cached(&cache, "main", &[b'x'; 100], T);

        let mut wire = transport(Vec::new());
        let state = cache
            .ensure_fresh(&mut wire, "main", ScreenStamp { size: 100, mtime: T as i64 })
            .expect("ensure fresh");

        assert_eq!(state, CacheState::Fresh);
        assert_eq!(wire.into_inner().output, vec![PacketClass::Not.to_byte()]);
    }

    #[test]
    fn newer_server_mtime_triggers_one_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::new(dir.path(), "localhost", 8000);
        write_cached(&cache, "main", &[b'x'; 100], T);

        let mut wire = transport(screen_define(b"<screen/>"));
        let state = cache
            .ensure_fresh(&mut wire, "main", ScreenStamp { size: 100, mtime: T as i64 + 1 })
            .expect("ensure fresh");

        assert_eq!(state, CacheState::Refreshed);
        assert_eq!(fs::read(cache.path_for("main")).expect("read"), b"<screen/>");
        let mut expected = vec![PacketClass::GetScreen.to_byte()];
        expected.extend_from_slice(b"main\n");
        assert_eq!(wire.into_inner().output, expected);
    }

    #[test]
    fn size_mismatch_is_stale_even_when_newer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::in_dir(dir.path());
        write_cached(&cache, "main", &[b'x'; 100], T + 50);
        assert!(!cache.is_fresh("main", ScreenStamp { size: 101, mtime: T as i64 }));
        assert!(cache.is_fresh("main", ScreenStamp { size: 100, mtime: T as i64 }));
    }

    #[test]
    fn missing_file_is_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::in_dir(dir.path());
        assert!(!cache.is_fresh("nothing", ScreenStamp { size: 0, mtime: 0 }));
    }

    #[test]
    fn unexpected_reply_to_get_screen_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::in_dir(dir.path());
        let mut wire = transport(vec![PacketClass::Not.to_byte()]);
        let err = cache.download(&mut wire, "main").expect_err("sequence error");
        assert!(matches!(
            err,
            ClientError::ProtocolSequence {
                found: PacketClass::Not,
                ..
            }
        ));
    }

    #[test]
    fn unwritable_cache_drains_stream_and_reports_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").expect("blocker");
        let cache = ScreenCache::in_dir(blocker.join("nested"));

        let mut input = screen_define(b"definition");
        input.push(PacketClass::End.to_byte());
        let mut wire = transport(input);

        let state = cache.download(&mut wire, "main").expect("non-fatal");
        assert_eq!(state, CacheState::Failed);
        assert_eq!(
            wire.receive_packet_class().expect("stream in sync"),
            PacketClass::End
        );
    }

    #[test]
    fn oversized_definition_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ScreenCache::in_dir(dir.path());
        let mut input = vec![PacketClass::ScreenDefine.to_byte()];
        input.extend_from_slice(&(-1_i64).to_le_bytes());
        let mut wire = transport(input);
        assert!(matches!(
            cache.download(&mut wire, "main"),
            Err(ClientError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn screen_names_stay_inside_the_cache() {
        let cache = ScreenCache::new("/cache", "example.org", 8000);
        assert_eq!(
            cache.path_for("../etc/passwd"),
            PathBuf::from("/cache/example.org/8000/.._etc_passwd")
        );
        assert_eq!(cache.path_for(".."), PathBuf::from("/cache/example.org/8000/_.."));
    }
}
