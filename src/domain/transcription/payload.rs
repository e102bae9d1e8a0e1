//! Normalization of client-supplied audio payloads
//!
//! Clients send audio in several shapes: raw byte arrays, nested objects such
//! as `{"audio": {"audio": "data:..."}}`, data URIs, or plain base64 strings.
//! Everything is reduced to an [`AudioData`] before it reaches the queue.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

use super::audio_data::{AudioData, AudioMimeType};
use crate::domain::error::PayloadError;

/// Nested objects deeper than this are rejected
const MAX_DEPTH: usize = 8;

/// Standard alphabet, tolerant of missing padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reduce a JSON payload to audio bytes
pub fn normalize(value: &Value) -> Result<AudioData, PayloadError> {
    let audio = normalize_at(value, 0)?;
    if audio.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(audio)
}

fn normalize_at(value: &Value, depth: usize) -> Result<AudioData, PayloadError> {
    if depth > MAX_DEPTH {
        return Err(PayloadError::TooDeep(MAX_DEPTH));
    }

    match value {
        Value::Null => Err(PayloadError::Empty),
        Value::String(s) => decode_string(s),
        Value::Array(items) => decode_byte_array(items),
        Value::Object(map) => {
            for key in ["audio", "data"] {
                if let Some(inner) = map.get(key).filter(|v| !is_falsy(v)) {
                    return normalize_at(inner, depth + 1);
                }
            }

            if let Some(inner) = map.values().find(|v| v.is_string() && !is_falsy(v)) {
                return normalize_at(inner, depth + 1);
            }

            // Only blank fields: the client sent an event without audio
            if map.values().any(|v| v.is_null() || v.as_str() == Some("")) {
                Err(PayloadError::Empty)
            } else {
                Err(PayloadError::UnsupportedFormat("object".to_string()))
            }
        }
        Value::Bool(_) => Err(PayloadError::UnsupportedFormat("boolean".to_string())),
        Value::Number(_) => Err(PayloadError::UnsupportedFormat("number".to_string())),
    }
}

/// `null`, `false`, `0` and `""` never carry audio
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn decode_string(s: &str) -> Result<AudioData, PayloadError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PayloadError::Empty);
    }

    if let Some(rest) = s.strip_prefix("data:") {
        // data:audio/webm;codecs=opus;base64,AAAA
        let (header, body) = rest.split_once(',').unwrap_or(("", rest));
        let mime_type = AudioMimeType::from_mime(header).unwrap_or_default();
        return Ok(AudioData::new(decode_base64(body)?, mime_type));
    }

    Ok(AudioData::new(decode_base64(s)?, AudioMimeType::default()))
}

fn decode_base64(s: &str) -> Result<Vec<u8>, PayloadError> {
    let cleaned: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| PayloadError::InvalidBase64(e.to_string()))
}

fn decode_byte_array(items: &[Value]) -> Result<AudioData, PayloadError> {
    let bytes = items
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| PayloadError::UnsupportedFormat("array of non-bytes".to_string()))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(AudioData::from(bytes))
}
