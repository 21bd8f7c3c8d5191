//! Buffered JSON response encoder
//!
//! Builds the pretty-printed Alpaca response body line by line into a
//! bounded buffer. When an append would not fit, the pending bytes are
//! flushed to the sink first, so large bodies (image arrays) stream out
//! without holding the whole response in memory.

use std::io::{self, Write};

use serde::Serialize;

/// Default response buffer capacity in bytes
pub const DEFAULT_CAPACITY: usize = 8192;

/// Slack reserved per line for quoting, separators and line endings
const LINE_OVERHEAD: usize = 20;

/// Attempts before a stalled write is reported as failed
const SEND_RETRIES: u32 = 10;

/// Per-request JSON response builder bound to an output sink
pub struct JsonEncoder<'a> {
    sink: &'a mut dyn Write,
    buf: String,
    capacity: usize,
    server_name: String,
    header_mode: bool,
    header_sent: bool,
    bytes_sent: usize,
}

impl<'a> JsonEncoder<'a> {
    /// Create an encoder writing to `sink`
    pub fn new(sink: &'a mut dyn Write, capacity: usize, server_name: impl Into<String>) -> Self {
        let capacity = capacity.max(LINE_OVERHEAD * 4);
        Self {
            sink,
            buf: String::with_capacity(capacity),
            capacity,
            server_name: server_name.into(),
            header_mode: false,
            header_sent: false,
            bytes_sent: 0,
        }
    }

    /// Start a new response body with an HTTP header pending
    pub fn create_header(&mut self) {
        self.buf.clear();
        self.buf.push_str("{\r\n");
        self.header_mode = true;
        self.header_sent = false;
    }

    /// Append `"key":"value"`
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_string(&mut self, key: &str, value: &str, comma: bool) -> io::Result<usize> {
        let value = quote(value);
        self.add_line(key, &value, comma)
    }

    /// Append a signed integer
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_i32(&mut self, key: &str, value: i32, comma: bool) -> io::Result<usize> {
        self.add_line(key, &value.to_string(), comma)
    }

    /// Append an unsigned integer
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_u32(&mut self, key: &str, value: u32, comma: bool) -> io::Result<usize> {
        self.add_line(key, &value.to_string(), comma)
    }

    /// Append a double with six fractional digits, `null` when not finite
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_f64(&mut self, key: &str, value: f64, comma: bool) -> io::Result<usize> {
        self.add_line(key, &format_f64(value), comma)
    }

    /// Append `true` or `false`
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_bool(&mut self, key: &str, value: bool, comma: bool) -> io::Result<usize> {
        self.add_line(key, if value { "true" } else { "false" }, comma)
    }

    /// Append any serializable value in compact JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or a needed flush fails
    pub fn add_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        comma: bool,
    ) -> io::Result<usize> {
        let json = serde_json::to_string(value)?;
        self.add_line(key, &json, comma)
    }

    /// Open an array: `"key":[`
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_array_start(&mut self, key: &str) -> io::Result<usize> {
        let key = quote(key);
        let sent = self.reserve(key.len() + LINE_OVERHEAD)?;
        self.buf.push_str("\t\t");
        self.buf.push_str(&key);
        self.buf.push_str(":[");
        Ok(sent + self.spill()?)
    }

    /// Close an array: `]` with optional comma
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_array_end(&mut self, comma: bool) -> io::Result<usize> {
        let sent = self.reserve(LINE_OVERHEAD)?;
        self.buf.push(']');
        if comma {
            self.buf.push(',');
        }
        self.buf.push_str("\r\n");
        Ok(sent + self.spill()?)
    }

    /// Append text verbatim
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_raw_text(&mut self, text: &str) -> io::Result<usize> {
        let sent = self.reserve(text.len() + LINE_OVERHEAD)?;
        self.buf.push_str(text);
        Ok(sent + self.spill()?)
    }

    /// Render the HTTP header
    ///
    /// `Content-Length` is only present when the full body length is known
    #[must_use]
    pub fn finish_header(&self, content_length: Option<usize>) -> String {
        let mut header = String::from("HTTP/1.0 200 OK\r\n");
        if let Some(len) = content_length {
            header.push_str(&format!("Content-Length: {len}\r\n"));
        }
        header.push_str("Content-type: application/json charset=utf-8\r\n");
        header.push_str(&format!("Server: {}\r\n\r\n", self.server_name));
        header
    }

    /// Write the pending buffer to the sink and reset it
    ///
    /// # Errors
    ///
    /// Returns the sink error once retries are exhausted
    pub fn send_buffer(&mut self) -> io::Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let sent = write_retrying(self.sink, self.buf.as_bytes())?;
        self.buf.clear();
        self.bytes_sent += sent;
        Ok(sent)
    }

    /// Close the object and send everything still buffered
    ///
    /// # Errors
    ///
    /// Returns the sink error once retries are exhausted
    pub fn finish(&mut self, include_header: bool) -> io::Result<usize> {
        if self.buf.is_empty() && !self.header_sent && self.bytes_sent == 0 {
            self.buf.push_str("{\r\n");
        }
        self.buf.push_str("}\r\n");
        if include_header && self.header_mode && !self.header_sent {
            let header = self.finish_header(Some(self.buf.len()));
            self.buf.insert_str(0, &header);
            self.header_sent = true;
        }
        let sent = self.send_buffer()?;
        self.sink.flush()?;
        Ok(sent)
    }

    /// Total bytes written to the sink so far
    #[must_use]
    pub const fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Bytes currently held in the buffer
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn add_line(&mut self, key: &str, value: &str, comma: bool) -> io::Result<usize> {
        let key = quote(key);
        let sent = self.reserve(key.len() + value.len() + LINE_OVERHEAD)?;
        self.buf.push_str("\t\t");
        self.buf.push_str(&key);
        self.buf.push(':');
        self.buf.push_str(value);
        if comma {
            self.buf.push(',');
        }
        self.buf.push_str("\r\n");
        Ok(sent + self.spill()?)
    }

    /// Flush ahead of an append of `extra` bytes when it would not fit
    fn reserve(&mut self, extra: usize) -> io::Result<usize> {
        if self.buf.is_empty() || self.buf.len() + extra < self.capacity {
            return Ok(0);
        }
        self.flush_chunk()
    }

    /// Flush after an oversized append so the buffer stays within capacity
    fn spill(&mut self) -> io::Result<usize> {
        if self.buf.len() < self.capacity {
            return Ok(0);
        }
        self.flush_chunk()
    }

    fn flush_chunk(&mut self) -> io::Result<usize> {
        let mut sent = 0;
        if self.header_mode && !self.header_sent {
            let header = self.finish_header(None);
            sent += write_retrying(self.sink, header.as_bytes())?;
            self.bytes_sent += sent;
            self.header_sent = true;
        }
        Ok(sent + self.send_buffer()?)
    }
}

/// Write all of `bytes`, tolerating transient stalls
fn write_retrying<W: Write + ?Sized>(sink: &mut W, mut bytes: &[u8]) -> io::Result<usize> {
    let total = bytes.len();
    let mut failures = 0;
    while !bytes.is_empty() {
        match sink.write(bytes) {
            Ok(0) => {
                failures += 1;
                if failures >= SEND_RETRIES {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer stopped accepting data",
                    ));
                }
            }
            Ok(n) => bytes = &bytes[n..],
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                failures += 1;
                if failures >= SEND_RETRIES {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn format_f64(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        "null".to_string()
    }
}

/// Write a plain-text `400 Bad Request` for requests that cannot be parsed
///
/// # Errors
///
/// Returns the sink error once retries are exhausted
pub fn write_bad_request<W: Write + ?Sized>(sink: &mut W, reason: &str) -> io::Result<usize> {
    let body = format!("Bad Request: {reason}\r\n");
    let response = format!(
        "HTTP/1.0 400 Bad Request\r\nContent-Length: {}\r\nContent-type: text/plain\r\n\r\n{body}",
        body.len()
    );
    let sent = write_retrying(sink, response.as_bytes())?;
    sink.flush()?;
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(raw: &[u8]) -> (String, serde_json::Value) {
        let text = String::from_utf8(raw.to_vec()).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        (head.to_string(), serde_json::from_str(body).unwrap())
    }

    #[test]
    fn small_body_has_content_length() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, DEFAULT_CAPACITY, "test");
        enc.create_header();
        enc.add_bool("Value", true, true).unwrap();
        enc.add_i32("ErrorNumber", 0, false).unwrap();
        enc.finish(true).unwrap();

        let (head, body) = split(&out);
        assert!(head.starts_with("HTTP/1.0 200 OK"));
        assert!(head.contains("Server: test"));
        let text = String::from_utf8(out.clone()).unwrap();
        let body_len = text.split_once("\r\n\r\n").unwrap().1.len();
        assert!(head.contains(&format!("Content-Length: {body_len}")));
        assert_eq!(body["Value"], true);
        assert_eq!(body["ErrorNumber"], 0);
    }

    #[test]
    fn lines_use_tab_indent_and_crlf() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, DEFAULT_CAPACITY, "test");
        enc.create_header();
        enc.add_string("Name", "dome", false).unwrap();
        enc.finish(false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\r\n\t\t\"Name\":\"dome\"\r\n}\r\n");
    }

    #[test]
    fn overflow_flushes_header_without_content_length() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, 128, "test");
        enc.create_header();
        enc.add_array_start("Value").unwrap();
        let mut flushed = 0;
        for row in 0..50 {
            let comma = if row < 49 { "," } else { "" };
            flushed += enc.add_raw_text(&format!("[{row},{row},{row}]{comma}")).unwrap();
            assert!(enc.pending() < 128);
        }
        enc.add_array_end(true).unwrap();
        enc.add_i32("ErrorNumber", 0, false).unwrap();
        enc.finish(true).unwrap();
        assert!(flushed > 0);

        let (head, body) = split(&out);
        assert!(!head.contains("Content-Length"));
        assert_eq!(body["Value"].as_array().unwrap().len(), 50);
        assert_eq!(body["Value"][49][2], 49);
    }

    #[test]
    fn strings_are_escaped() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, DEFAULT_CAPACITY, "test");
        enc.create_header();
        enc.add_string("ErrorMessage", "bad \"quote\"\n\\", false).unwrap();
        enc.finish(true).unwrap();
        let (_, body) = split(&out);
        assert_eq!(body["ErrorMessage"], "bad \"quote\"\n\\");
    }

    #[test]
    fn doubles_have_six_digits_and_nan_is_null() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, DEFAULT_CAPACITY, "test");
        enc.create_header();
        enc.add_f64("Azimuth", 12.5, true).unwrap();
        enc.add_f64("Broken", f64::NAN, false).unwrap();
        enc.finish(false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"Azimuth\":12.500000,"));
        assert!(text.contains("\"Broken\":null"));
    }

    #[test]
    fn finish_without_content_is_an_empty_object() {
        let mut out = Vec::new();
        let mut enc = JsonEncoder::new(&mut out, DEFAULT_CAPACITY, "test");
        enc.finish(false).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(body.as_object().unwrap().is_empty());
    }

    struct Stalled;

    impl Write for Stalled {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stalled_sink_fails_after_retries() {
        let mut sink = Stalled;
        let mut enc = JsonEncoder::new(&mut sink, DEFAULT_CAPACITY, "test");
        enc.create_header();
        enc.add_bool("Value", true, false).unwrap();
        let err = enc.finish(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn bad_request_is_plain_text() {
        let mut out = Vec::new();
        write_bad_request(&mut out, "malformed request line").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.0 400 Bad Request\r\n"));
        assert!(text.ends_with("malformed request line\r\n"));
    }
}
