//! AWS event-stream framing (`application/vnd.amazon.eventstream`)
//!
//! Each message is laid out as:
//!
//! ```text
//! total_len:u32 | headers_len:u32 | prelude_crc:u32 | headers | payload | message_crc:u32
//! ```
//!
//! All integers are big-endian; both CRCs are CRC-32 (IEEE). Headers are
//! `name_len:u8 | name | type:u8 | value` with type-specific value encoding.

use crate::error::{AgentError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + CRC_LEN;
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Typed header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl HeaderValue {
    fn type_id(&self) -> u8 {
        match self {
            HeaderValue::Bool(true) => 0,
            HeaderValue::Bool(false) => 1,
            HeaderValue::Byte(_) => 2,
            HeaderValue::Int16(_) => 3,
            HeaderValue::Int32(_) => 4,
            HeaderValue::Int64(_) => 5,
            HeaderValue::Bytes(_) => 6,
            HeaderValue::String(_) => 7,
            HeaderValue::Timestamp(_) => 8,
            HeaderValue::Uuid(_) => 9,
        }
    }
}

/// A message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: HeaderValue,
}

impl Header {
    /// Convenience constructor for string headers
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: HeaderValue::String(value.into()),
        }
    }
}

/// One decoded event-stream message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub headers: Vec<Header>,
    pub payload: Bytes,
}

impl Message {
    /// Value of a string header
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|h| match &h.value {
            HeaderValue::String(s) if h.name == name => Some(s.as_str()),
            _ => None,
        })
    }
}

/// Incremental decoder fed with arbitrary body chunks
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buffer: BytesMut,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the body
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete message, `None` if more bytes are needed
    pub fn decode(&mut self) -> Result<Option<Message>> {
        if self.buffer.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;
        let headers_len = u32::from_be_bytes([
            self.buffer[4],
            self.buffer[5],
            self.buffer[6],
            self.buffer[7],
        ]) as usize;
        let prelude_crc = u32::from_be_bytes([
            self.buffer[8],
            self.buffer[9],
            self.buffer[10],
            self.buffer[11],
        ]);

        if crc32fast::hash(&self.buffer[..8]) != prelude_crc {
            return Err(malformed("prelude checksum mismatch"));
        }
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total_len) {
            return Err(malformed(format!("invalid message length {}", total_len)));
        }
        if headers_len > total_len - MIN_MESSAGE_LEN {
            return Err(malformed(format!(
                "headers length {} exceeds message length {}",
                headers_len, total_len
            )));
        }
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total_len).freeze();
        let body_end = total_len - CRC_LEN;
        let message_crc = u32::from_be_bytes([
            frame[body_end],
            frame[body_end + 1],
            frame[body_end + 2],
            frame[body_end + 3],
        ]);
        if crc32fast::hash(&frame[..body_end]) != message_crc {
            return Err(malformed("message checksum mismatch"));
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(frame.slice(PRELUDE_LEN..headers_end))?;
        let payload = frame.slice(headers_end..body_end);

        Ok(Some(Message { headers, payload }))
    }
}

fn malformed(reason: impl Into<String>) -> AgentError {
    AgentError::MalformedResponse(format!("event stream: {}", reason.into()))
}

fn need(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        Err(malformed("truncated header"))
    } else {
        Ok(())
    }
}

fn parse_headers(mut buf: Bytes) -> Result<Vec<Header>> {
    let mut headers = Vec::new();
    while buf.has_remaining() {
        let name_len = buf.get_u8() as usize;
        need(&buf, name_len)?;
        let name = String::from_utf8(buf.split_to(name_len).to_vec())
            .map_err(|_| malformed("header name is not UTF-8"))?;

        need(&buf, 1)?;
        let value = match buf.get_u8() {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => {
                need(&buf, 1)?;
                HeaderValue::Byte(buf.get_i8())
            }
            3 => {
                need(&buf, 2)?;
                HeaderValue::Int16(buf.get_i16())
            }
            4 => {
                need(&buf, 4)?;
                HeaderValue::Int32(buf.get_i32())
            }
            5 => {
                need(&buf, 8)?;
                HeaderValue::Int64(buf.get_i64())
            }
            6 => {
                need(&buf, 2)?;
                let len = buf.get_u16() as usize;
                need(&buf, len)?;
                HeaderValue::Bytes(buf.split_to(len).to_vec())
            }
            7 => {
                need(&buf, 2)?;
                let len = buf.get_u16() as usize;
                need(&buf, len)?;
                let s = String::from_utf8(buf.split_to(len).to_vec())
                    .map_err(|_| malformed(format!("header '{}' is not UTF-8", name)))?;
                HeaderValue::String(s)
            }
            8 => {
                need(&buf, 8)?;
                HeaderValue::Timestamp(buf.get_i64())
            }
            9 => {
                need(&buf, 16)?;
                let mut uuid = [0u8; 16];
                buf.copy_to_slice(&mut uuid);
                HeaderValue::Uuid(uuid)
            }
            other => return Err(malformed(format!("unknown header type {}", other))),
        };

        headers.push(Header { name, value });
    }
    Ok(headers)
}

fn write_header(out: &mut BytesMut, header: &Header) {
    out.put_u8(header.name.len() as u8);
    out.put_slice(header.name.as_bytes());
    out.put_u8(header.value.type_id());
    match &header.value {
        HeaderValue::Bool(_) => {}
        HeaderValue::Byte(v) => out.put_i8(*v),
        HeaderValue::Int16(v) => out.put_i16(*v),
        HeaderValue::Int32(v) => out.put_i32(*v),
        HeaderValue::Int64(v) | HeaderValue::Timestamp(v) => out.put_i64(*v),
        HeaderValue::Bytes(v) => {
            out.put_u16(v.len() as u16);
            out.put_slice(v);
        }
        HeaderValue::String(v) => {
            out.put_u16(v.len() as u16);
            out.put_slice(v.as_bytes());
        }
        HeaderValue::Uuid(v) => out.put_slice(v),
    }
}

/// Encode one message
///
/// Used by test doubles that play the service side of the stream.
pub fn encode_message(headers: &[Header], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = BytesMut::new();
    for header in headers {
        write_header(&mut header_bytes, header);
    }

    let total_len = PRELUDE_LEN + header_bytes.len() + payload.len() + CRC_LEN;
    let mut out = BytesMut::with_capacity(total_len);
    out.put_u32(total_len as u32);
    out.put_u32(header_bytes.len() as u32);
    let prelude_crc = crc32fast::hash(&out[..8]);
    out.put_u32(prelude_crc);
    out.put_slice(&header_bytes);
    out.put_slice(payload);
    let message_crc = crc32fast::hash(&out[..]);
    out.put_u32(message_crc);
    out.to_vec()
}

/// Encode an agent `event` message of the given type
pub fn encode_event(event_type: &str, payload: &serde_json::Value) -> Vec<u8> {
    encode_message(
        &[
            Header::string(":message-type", "event"),
            Header::string(":event-type", event_type),
            Header::string(":content-type", "application/json"),
        ],
        payload.to_string().as_bytes(),
    )
}

/// Encode an `exception` message
pub fn encode_exception(exception_type: &str, message: &str) -> Vec<u8> {
    encode_message(
        &[
            Header::string(":message-type", "exception"),
            Header::string(":exception-type", exception_type),
            Header::string(":content-type", "application/json"),
        ],
        serde_json::json!({ "message": message }).to_string().as_bytes(),
    )
}
