use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanviewError};

/// A W3C/OTLP trace id in lowercase hex. Both the 128-bit form and the legacy
/// 64-bit form are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !matches!(input.len(), 16 | 32) || !input.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SpanviewError::Parse(format!("invalid trace id: {input}")));
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
