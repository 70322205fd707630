/// Length-prefixed binary encoding of the inner HTTP request and response.
///
/// This is the plaintext carried inside the encapsulation; it never appears
/// on the outer wire.
///
/// Request:
/// [method_len(2B) method | scheme_len(2B) scheme | host_len(2B) host
///  | path_len(2B) path | header_count(2B) (name_len(2B) name value_len(2B) value)*
///  | body_len(4B) body]
///
/// Response:
/// [status(2B) | header_count(2B) (name_len(2B) name value_len(2B) value)* | body_len(4B) body]
use bytes::{Buf, BufMut};

use crate::error::{GatewayError, Result};

/// The inner request schema: enough to reconstruct a conventional HTTP
/// request at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRequest {
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The inner response schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

fn put_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| GatewayError::MalformedMessage("field exceeds 64 KiB".to_string()))?;
    out.put_u16(len);
    out.put_slice(bytes);
    Ok(())
}

fn get_prefixed(buf: &mut &[u8]) -> Result<Vec<u8>> {
    if buf.remaining() < 2 {
        return Err(GatewayError::MalformedMessage("truncated length".to_string()));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(GatewayError::MalformedMessage("truncated field".to_string()));
    }
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn get_string(buf: &mut &[u8]) -> Result<String> {
    String::from_utf8(get_prefixed(buf)?)
        .map_err(|_| GatewayError::MalformedMessage("field is not UTF-8".to_string()))
}

fn put_headers(out: &mut Vec<u8>, headers: &[(String, String)]) -> Result<()> {
    let count = u16::try_from(headers.len())
        .map_err(|_| GatewayError::MalformedMessage("too many headers".to_string()))?;
    out.put_u16(count);
    for (name, value) in headers {
        put_prefixed(out, name.as_bytes())?;
        put_prefixed(out, value.as_bytes())?;
    }
    Ok(())
}

fn get_headers(buf: &mut &[u8]) -> Result<Vec<(String, String)>> {
    if buf.remaining() < 2 {
        return Err(GatewayError::MalformedMessage(
            "truncated header count".to_string(),
        ));
    }
    let count = buf.get_u16() as usize;
    let mut headers = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let name = get_string(buf)?;
        let value = get_string(buf)?;
        headers.push((name, value));
    }
    Ok(headers)
}

fn put_body(out: &mut Vec<u8>, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| GatewayError::MalformedMessage("body exceeds 4 GiB".to_string()))?;
    out.put_u32(len);
    out.put_slice(body);
    Ok(())
}

fn get_body(buf: &mut &[u8]) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(GatewayError::MalformedMessage(
            "truncated body length".to_string(),
        ));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(GatewayError::MalformedMessage("truncated body".to_string()));
    }
    let body = buf[..len].to_vec();
    buf.advance(len);
    Ok(body)
}

impl BinaryRequest {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_prefixed(&mut out, self.method.as_bytes())?;
        put_prefixed(&mut out, self.scheme.as_bytes())?;
        put_prefixed(&mut out, self.host.as_bytes())?;
        put_prefixed(&mut out, self.path.as_bytes())?;
        put_headers(&mut out, &self.headers)?;
        put_body(&mut out, &self.body)?;
        Ok(out)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let request = Self {
            method: get_string(&mut buf)?,
            scheme: get_string(&mut buf)?,
            host: get_string(&mut buf)?,
            path: get_string(&mut buf)?,
            headers: get_headers(&mut buf)?,
            body: get_body(&mut buf)?,
        };
        if buf.has_remaining() {
            return Err(GatewayError::MalformedMessage(
                "trailing bytes after request".to_string(),
            ));
        }
        Ok(request)
    }
}

impl BinaryResponse {
    /// A headerless, bodiless response carrying only a status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.put_u16(self.status);
        put_headers(&mut out, &self.headers)?;
        put_body(&mut out, &self.body)?;
        Ok(out)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.remaining() < 2 {
            return Err(GatewayError::MalformedMessage(
                "truncated status".to_string(),
            ));
        }
        let response = Self {
            status: buf.get_u16(),
            headers: get_headers(&mut buf)?,
            body: get_body(&mut buf)?,
        };
        if buf.has_remaining() {
            return Err(GatewayError::MalformedMessage(
                "trailing bytes after response".to_string(),
            ));
        }
        Ok(response)
    }
}
