pub mod fingerprint;
pub mod record_uri;
pub mod server_uri;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::ShareError;

pub use record_uri::{export_records, import_records, ImportSummary, RecordKind, ShareRecord};
pub use server_uri::{import_servers, server_to_base64_uri, server_to_uri};

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Standard padded base64 of UTF-8 text
pub fn encode_base64(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

/// Decode base64 text with or without padding, standard or URL-safe alphabet
pub fn decode_base64(input: &str) -> Result<String, ShareError> {
    let input = input.trim();
    let bytes = match LENIENT.decode(input) {
        Ok(bytes) => bytes,
        Err(e) => LENIENT_URL_SAFE.decode(input).map_err(|_| e)?,
    };
    Ok(String::from_utf8(bytes)?)
}

/// Percent-decode, returning the input unchanged when it is not valid
pub fn safe_decode_uri(input: &str) -> String {
    match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            log::debug!("Failed to decode URI component {:?}: {}", input, e);
            input.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_padding() {
        assert_eq!(decode_base64("aGk=").unwrap(), "hi");
        assert_eq!(decode_base64("aGk").unwrap(), "hi");
        assert_eq!(decode_base64(&encode_base64("多语言")).unwrap(), "多语言");
    }

    #[test]
    fn test_decode_url_safe_alphabet() {
        // "??>" encodes to "Pz8+" in the standard alphabet
        assert_eq!(decode_base64("Pz8-").unwrap(), "??>");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn test_safe_decode_uri() {
        assert_eq!(safe_decode_uri("HK%2001"), "HK 01");
        assert_eq!(safe_decode_uri("plain"), "plain");
    }
}
