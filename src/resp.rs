use bytes::{Buf, BytesMut};
use std::io;

/// Largest bulk string payload accepted from the wire.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
/// Largest element count accepted for an array header.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// A RESP2 value.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n  or  $-1\r\n (null)
    BulkString(Option<Vec<u8>>),
    /// *2\r\n...  or  *-1\r\n (null)
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    /// Build a command frame (array of bulk strings) from string-ish parts.
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        RespValue::Array(Some(
            parts
                .into_iter()
                .map(|p| RespValue::BulkString(Some(p.into())))
                .collect(),
        ))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Serialize this value to RESP bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }

    /// Write RESP bytes into the given buffer.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => write_line(buf, b'+', s.as_bytes()),
            RespValue::Error(s) => write_line(buf, b'-', s.as_bytes()),
            RespValue::Integer(n) => write_line(buf, b':', n.to_string().as_bytes()),
            RespValue::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => {
                write_line(buf, b'$', data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(Some(items)) => {
                write_line(buf, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }

    /// Raw bytes of a string-like value (for command argument parsing).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(Some(data)) => Some(data),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert to a UTF-8 string, if possible.
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

fn write_line(buf: &mut Vec<u8>, marker: u8, body: &[u8]) {
    buf.push(marker);
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\r\n");
}

/// Streaming RESP parser.
///
/// Frames are decoded against a read-only view of the buffer and bytes are
/// only consumed once a whole top-level frame (nested elements included) is
/// available. A partial frame leaves the buffer untouched.
pub struct RespParser;

/// Outcome of decoding at an offset: the value and the offset just past it,
/// or `None` if more bytes are required.
type Step<T> = Result<Option<(T, usize)>, RespError>;

impl RespParser {
    /// Try to parse a complete RESP value from the buffer.
    /// On success, consumes the parsed bytes from `buf` and returns the value.
    /// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::parse_at(&buf[..], 0)? {
            Some((value, end)) => {
                buf.advance(end);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Decode every complete frame in `data`, returning the values and the
    /// number of bytes they occupied. Trailing partial data is left unread.
    pub fn parse_all(data: &[u8]) -> Result<(Vec<RespValue>, usize), RespError> {
        let mut values = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            match Self::parse_at(data, pos)? {
                Some((value, end)) => {
                    values.push(value);
                    pos = end;
                }
                None => break,
            }
        }
        Ok((values, pos))
    }

    fn parse_at(buf: &[u8], pos: usize) -> Step<RespValue> {
        let Some(&marker) = buf.get(pos) else {
            return Ok(None);
        };

        match marker {
            b'+' => Ok(read_line(buf, pos + 1)?.map(|(line, end)| {
                (RespValue::SimpleString(String::from_utf8_lossy(line).into_owned()), end)
            })),
            b'-' => Ok(read_line(buf, pos + 1)?.map(|(line, end)| {
                (RespValue::Error(String::from_utf8_lossy(line).into_owned()), end)
            })),
            b':' => match read_line(buf, pos + 1)? {
                Some((line, end)) => Ok(Some((RespValue::Integer(parse_int(line)?), end))),
                None => Ok(None),
            },
            b'$' => Self::parse_bulk_string(buf, pos + 1),
            b'*' => Self::parse_array(buf, pos + 1),
            other => Err(RespError::InvalidByte(other)),
        }
    }

    fn parse_bulk_string(buf: &[u8], pos: usize) -> Step<RespValue> {
        let Some((line, start)) = read_line(buf, pos)? else {
            return Ok(None);
        };
        let len = parse_int(line)?;

        if len == -1 {
            return Ok(Some((RespValue::BulkString(None), start)));
        }
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(RespError::InvalidData("invalid bulk length".into()));
        }

        let len = len as usize;
        let end = start + len;
        if buf.len() < end + 2 {
            return Ok(None);
        }
        if &buf[end..end + 2] != b"\r\n" {
            return Err(RespError::InvalidData(
                "Missing trailing CRLF after bulk string".into(),
            ));
        }

        Ok(Some((RespValue::BulkString(Some(buf[start..end].to_vec())), end + 2)))
    }

    fn parse_array(buf: &[u8], pos: usize) -> Step<RespValue> {
        let Some((line, mut cursor)) = read_line(buf, pos)? else {
            return Ok(None);
        };
        let len = parse_int(line)?;

        if len == -1 {
            return Ok(Some((RespValue::Array(None), cursor)));
        }
        if !(0..=MAX_ARRAY_LEN).contains(&len) {
            return Err(RespError::InvalidData("invalid multibulk length".into()));
        }

        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            match Self::parse_at(buf, cursor)? {
                Some((item, next)) => {
                    items.push(item);
                    cursor = next;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(Some(items)), cursor)))
    }
}

/// Read a CRLF-terminated line starting at `start`.
/// A LF that is not preceded by CR makes the frame invalid.
fn read_line(buf: &[u8], start: usize) -> Step<&[u8]> {
    if start > buf.len() {
        return Ok(None);
    }
    match buf[start..].iter().position(|&b| b == b'\n') {
        None => Ok(None),
        Some(offset) => {
            let lf = start + offset;
            if lf == start || buf[lf - 1] != b'\r' {
                return Err(RespError::InvalidData("expected CRLF line terminator".into()));
            }
            Ok(Some((&buf[start..lf - 1], lf + 1)))
        }
    }
}

fn parse_int(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RespError::InvalidData(format!("invalid integer: {}", String::from_utf8_lossy(line)))
        })
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("unexpected type marker '{}'", *.0 as char)]
    InvalidByte(u8),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
