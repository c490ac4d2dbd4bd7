use std::io::{self, BufRead, BufReader, Read, Write};

use encoding_rs::{Encoding, UTF_8};
use tracing::warn;

use crate::error::{ClientError, Result};

pub const PROTOCOL_VERSION: &str = "1.1.2";

/// Longest control or scalar line accepted from the server.
pub const MAX_LINE_BYTES: usize = 1_048_576;
pub const MAX_SCREEN_DEFINE_BYTES: u64 = 64 * 1_048_576;

const COPY_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketClass {
    Connect,
    QueryScreen,
    GetScreen,
    GetData,
    ScreenData,
    Event,
    ScreenDefine,
    WindowName,
    FocusName,
    Not,
    VersionMismatch,
    AuthError,
    InvalidApplication,
    Ok,
    End,
}

impl PacketClass {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Connect => 0x01,
            Self::QueryScreen => 0x02,
            Self::GetScreen => 0x03,
            Self::GetData => 0x04,
            Self::ScreenData => 0x05,
            Self::Event => 0x06,
            Self::ScreenDefine => 0x07,
            Self::WindowName => 0x08,
            Self::FocusName => 0x09,
            Self::Not => 0xF0,
            Self::VersionMismatch => 0xF1,
            Self::AuthError => 0xF2,
            Self::InvalidApplication => 0xF3,
            Self::Ok => 0xFE,
            Self::End => 0xFF,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        let class = match byte {
            0x01 => Self::Connect,
            0x02 => Self::QueryScreen,
            0x03 => Self::GetScreen,
            0x04 => Self::GetData,
            0x05 => Self::ScreenData,
            0x06 => Self::Event,
            0x07 => Self::ScreenDefine,
            0x08 => Self::WindowName,
            0x09 => Self::FocusName,
            0xF0 => Self::Not,
            0xF1 => Self::VersionMismatch,
            0xF2 => Self::AuthError,
            0xF3 => Self::InvalidApplication,
            0xFE => Self::Ok,
            0xFF => Self::End,
            other => return Err(ClientError::UnknownPacketClass(other)),
        };
        Ok(class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Null,
    Current,
    New,
    Close,
    Change,
    Join,
    Fork,
    EndSession,
}

impl WindowKind {
    pub fn to_wire(self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Current => 1,
            Self::New => 2,
            Self::Close => 3,
            Self::Change => 4,
            Self::Join => 5,
            Self::Fork => 6,
            Self::EndSession => 7,
        }
    }

    pub fn from_wire(raw: i32) -> Result<Self> {
        let kind = match raw {
            0 => Self::Null,
            1 => Self::Current,
            2 => Self::New,
            3 => Self::Close,
            4 => Self::Change,
            5 => Self::Join,
            6 => Self::Fork,
            7 => Self::EndSession,
            other => return Err(ClientError::UnknownWindowKind(other)),
        };
        Ok(kind)
    }

    pub fn carries_data(self) -> bool {
        matches!(self, Self::Current | Self::New | Self::Change)
    }

    pub fn stops_cycle(self) -> bool {
        matches!(self, Self::Close | Self::Join | Self::New | Self::Change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Bool,
    Char,
    Text,
    VarChar,
    DbCode,
    Number,
    Array,
    Record,
}

impl DataType {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Int => 0x10,
            Self::Bool => 0x11,
            Self::Char => 0x20,
            Self::Text => 0x21,
            Self::VarChar => 0x22,
            Self::DbCode => 0x23,
            Self::Number => 0x40,
            Self::Array => 0x90,
            Self::Record => 0xA0,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        let tag = match byte {
            0x10 => Self::Int,
            0x11 => Self::Bool,
            0x20 => Self::Char,
            0x21 => Self::Text,
            0x22 => Self::VarChar,
            0x23 => Self::DbCode,
            0x40 => Self::Number,
            0x90 => Self::Array,
            0xA0 => Self::Record,
            other => return Err(ClientError::UnknownDataType(other)),
        };
        Ok(tag)
    }
}

/// Blocking duplex byte stream carrying the session protocol.
///
/// Reads go through a buffer; writes go straight to the stream and are
/// flushed at frame-group boundaries by the session. Any I/O error is fatal.
/// Strings are transcoded with the session's text encoding (UTF-8 unless set).
pub struct Transport<S> {
    stream: BufReader<S>,
    encoding: &'static Encoding,
}

impl<S> Transport<S> {
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

impl<S: Read> Transport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            encoding: UTF_8,
        }
    }

    pub fn receive_packet_class(&mut self) -> Result<PacketClass> {
        PacketClass::from_byte(self.receive_byte()?)
    }

    pub fn receive_data_type(&mut self) -> Result<DataType> {
        DataType::from_byte(self.receive_byte()?)
    }

    pub fn receive_byte(&mut self) -> Result<u8> {
        let mut buf = [0_u8; 1];
        self.stream.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn receive_int(&mut self) -> Result<i32> {
        let mut buf = [0_u8; 4];
        self.stream.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn receive_long(&mut self) -> Result<i64> {
        let mut buf = [0_u8; 8];
        self.stream.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn receive_bool(&mut self) -> Result<bool> {
        Ok(self.receive_byte()? != 0)
    }

    /// Reads up to a line terminator and trims trailing CR/LF. Bytes the
    /// encoding cannot map become U+FFFD.
    pub fn receive_string(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)?;

        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed").into());
        }
        if line.last() != Some(&b'\n') {
            if line.len() > MAX_LINE_BYTES {
                return Err(ClientError::FrameTooLarge {
                    len: line.len() as u64,
                    max: MAX_LINE_BYTES as u64,
                });
            }
            return Err(
                io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated string").into(),
            );
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }

        let (text, had_errors) = self.encoding.decode_without_bom_handling(&line);
        if had_errors {
            warn!(encoding = self.encoding.name(), "undecodable bytes in string replaced");
        }
        Ok(text.into_owned())
    }

    pub fn receive_count(&mut self) -> Result<usize> {
        let count = self.receive_int()?;
        usize::try_from(count).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("negative count {count}")).into()
        })
    }

    /// Streams exactly `len` bytes into `sink`. If `sink` fails, the
    /// remaining bytes are still drained so the stream stays framed; the
    /// sink error is returned separately from transport errors.
    pub fn receive_into(
        &mut self,
        len: u64,
        sink: &mut impl Write,
    ) -> Result<std::result::Result<(), io::Error>> {
        let mut left = len;
        let mut buf = [0_u8; COPY_CHUNK];
        let mut sink_error = None;

        while left > 0 {
            let chunk = left.min(COPY_CHUNK as u64) as usize;
            self.stream.read_exact(&mut buf[..chunk])?;
            if sink_error.is_none() {
                if let Err(err) = sink.write_all(&buf[..chunk]) {
                    sink_error = Some(err);
                }
            }
            left -= chunk as u64;
        }

        match sink_error {
            Some(err) => Ok(Err(err)),
            None => Ok(sink.flush()),
        }
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

impl<S: Write> Transport<S> {
    pub fn send_packet_class(&mut self, class: PacketClass) -> Result<()> {
        self.write_all(&[class.to_byte()])
    }

    pub fn send_data_type(&mut self, tag: DataType) -> Result<()> {
        self.write_all(&[tag.to_byte()])
    }

    pub fn send_int(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn send_long(&mut self, value: i64) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn send_bool(&mut self, value: bool) -> Result<()> {
        self.write_all(&[u8::from(value)])
    }

    pub fn send_string_delim(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        let (bytes, _, _) = self.encoding.encode(value);
        self.write_all(&bytes)
    }

    pub fn send_string(&mut self, value: &str) -> Result<()> {
        self.send_string_delim(value)?;
        self.write_all(b"\n")
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.get_mut().flush()?;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.get_mut().write_all(bytes)?;
        Ok(())
    }
}
