//! Error message extraction from response bodies.
//!
//! The service usually answers a failed request with a JSON document
//! carrying `code` and `message`. Gateways and proxies in between may
//! answer with plain text instead, which is returned verbatim.

use super::NormalizeError;
use serde_json::error::Category;
use serde_json::Value;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Structured error body returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDocument {
    /// Service error code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// The full document.
    pub raw: Value,
}

impl ErrorDocument {
    fn from_value(raw: Value) -> Self {
        let field = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            code: field("code"),
            message: field("message"),
            raw,
        }
    }
}

impl fmt::Display for ErrorDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// What could be recovered from an error body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedError {
    /// The parsed document, when the body was a JSON object.
    pub document: Option<ErrorDocument>,
    /// The message to surface, if any.
    pub message: Option<String>,
}

/// Extracts an error message from a response body.
///
/// The stream is consumed and dropped before returning. A missing stream
/// yields no message. A JSON body yields its `message` field, or the whole
/// document when that field is empty. A body that is not well-formed JSON
/// is re-read from offset 0 and returned as text. A leading UTF-8 byte
/// order mark is ignored.
///
/// A stream that fails while being read or rewound is not treated as an
/// absent body: the I/O fault is returned as [`NormalizeError::BodyRead`].
pub fn extract_error<R>(stream: Option<R>) -> Result<ExtractedError, NormalizeError>
where
    R: Read + Seek,
{
    let Some(mut stream) = stream else {
        return Ok(ExtractedError::default());
    };
    skip_bom(&mut stream)?;

    match serde_json::from_reader::<_, Value>(&mut stream) {
        Ok(raw) => {
            if !raw.is_object() {
                return Ok(ExtractedError {
                    document: None,
                    message: non_empty(raw.to_string()),
                });
            }

            let document = ErrorDocument::from_value(raw);
            let message = match document.message.as_deref() {
                Some(message) if !message.is_empty() => message.to_string(),
                _ => document.to_string(),
            };
            Ok(ExtractedError {
                document: Some(document),
                message: Some(message),
            })
        }
        Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => {
            debug!(error = %e, "Error body is not JSON, using raw text");
            stream.seek(SeekFrom::Start(0))?;
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf)?;
            let text = String::from_utf8_lossy(&buf);
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            Ok(ExtractedError {
                document: None,
                message: non_empty(text.to_string()),
            })
        }
        Err(e) if e.classify() == Category::Io => Err(NormalizeError::BodyRead(e.into())),
        Err(e) => Err(NormalizeError::BodyParse(e)),
    }
}

/// Extracts only the message from a response body.
pub fn extract_message<R>(stream: Option<R>) -> Result<Option<String>, NormalizeError>
where
    R: Read + Seek,
{
    Ok(extract_error(stream)?.message)
}

fn skip_bom<R: Read + Seek>(stream: &mut R) -> std::io::Result<()> {
    let start = stream.stream_position()?;
    let mut prefix = Vec::with_capacity(UTF8_BOM.len());
    (&mut *stream)
        .take(UTF8_BOM.len() as u64)
        .read_to_end(&mut prefix)?;
    if prefix != UTF8_BOM {
        stream.seek(SeekFrom::Start(start))?;
    }
    Ok(())
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
