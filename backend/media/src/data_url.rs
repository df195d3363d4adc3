//! `data:` URL encoding for image previews.

use base64::{Engine, engine::general_purpose::STANDARD};

/// Encode a blob as `data:<mime>;base64,<payload>`.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// The portion of a data URL after its first comma.
///
/// A string without a comma is returned unchanged.
pub fn data_url_payload(data_url: &str) -> &str {
    data_url
        .split_once(',')
        .map(|(_, payload)| payload)
        .unwrap_or(data_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_media_type_prefix() {
        assert_eq!(encode_data_url("image/png", &[1, 2, 3]), "data:image/png;base64,AQID");
    }

    #[test]
    fn payload_splits_on_first_comma_only() {
        assert_eq!(data_url_payload("data:image/png;base64,AQID"), "AQID");
        assert_eq!(data_url_payload("data:x;base64,a,b"), "a,b");
        assert_eq!(data_url_payload("AQID"), "AQID");
    }
}
