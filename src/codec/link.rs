//! `vmess://` share-link encoding.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::descriptor::ClientDescriptor;

/// Scheme prefix of every share link.
pub const VMESS_PREFIX: &str = "vmess://";

/// Standard alphabet; accepts payloads with or without `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Result of decoding one stored token.
///
/// `fields` holds the payload's JSON object exactly as decoded, whichever
/// tool generated it, and is `None` when the token is not a `vmess://`
/// base64 JSON object. `raw` always echoes the input. Serializes as the
/// payload's fields plus `_raw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedLink {
    #[serde(flatten)]
    pub fields: Option<Map<String, Value>>,

    #[serde(rename = "_raw")]
    pub raw: String,
}

impl DecodedLink {
    fn raw_only(raw: &str) -> Self {
        Self {
            fields: None,
            raw: raw.to_string(),
        }
    }

    /// Display name (`ps`), if the payload carries a string one.
    pub fn name(&self) -> Option<&str> {
        self.fields.as_ref()?.get("ps")?.as_str()
    }

    /// The payload as a typed descriptor, when it has every descriptor field.
    pub fn descriptor(&self) -> Option<ClientDescriptor> {
        let fields = self.fields.clone()?;
        serde_json::from_value(Value::Object(fields)).ok()
    }
}

/// Encode a descriptor as `vmess://` + base64(JSON).
pub fn encode(descriptor: &ClientDescriptor) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(descriptor)?;
    Ok(format!("{VMESS_PREFIX}{}", STANDARD.encode(json)))
}

/// Decode a stored token. Never fails: anything unrecognized comes back
/// as a raw-only record.
pub fn decode(token: &str) -> DecodedLink {
    let Some(payload) = token.strip_prefix(VMESS_PREFIX) else {
        return DecodedLink::raw_only(token);
    };

    let fields = LENIENT
        .decode(payload.trim())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Map<String, Value>>(&bytes).ok());

    match fields {
        Some(mut fields) => {
            // `_raw` is always the stored token.
            fields.remove("_raw");
            DecodedLink {
                fields: Some(fields),
                raw: token.to_string(),
            }
        }
        None => DecodedLink::raw_only(token),
    }
}
