//! Header encoding and decoding for x402 messages.
//!
//! Both headers carry base64 JSON produced by [`x402_core::encoding`].

use x402_core::encoding::{self, DecodingError};
use x402_core::proto::{PaymentPayload, SettleResponse};

/// Encodes a [`PaymentPayload`] for the `X-PAYMENT` header.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String, serde_json::Error> {
    encoding::encode(payload)
}

/// Decodes an `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`DecodingError`] on base64 or JSON failure.
pub fn decode_payment_header(value: impl AsRef<[u8]>) -> Result<PaymentPayload, DecodingError> {
    encoding::decode(value)
}

/// Encodes a [`SettleResponse`] for the `X-PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, serde_json::Error> {
    encoding::encode(response)
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
///
/// Padded standard base64, as emitted by some servers, is accepted.
///
/// # Errors
///
/// Returns [`DecodingError`] on base64 or JSON failure.
pub fn decode_payment_response(value: impl AsRef<[u8]>) -> Result<SettleResponse, DecodingError> {
    encoding::decode(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn decodes_padded_settlement_header() {
        let json = r#"{"success":true,"transaction":"0xabc","network":"base-sepolia","payer":"0x123"}"#;
        let padded = STANDARD.encode(json);
        assert!(padded.ends_with('='));
        let response = decode_payment_response(padded).unwrap();
        assert_eq!(
            response,
            SettleResponse::Success {
                payer: Some("0x123".into()),
                transaction: "0xabc".into(),
                network: Some("base-sepolia".into()),
            }
        );
    }

    #[test]
    fn settlement_round_trip() {
        let response = SettleResponse::Error {
            reason: "invalid_signature".into(),
            network: None,
        };
        let encoded = encode_payment_response(&response).unwrap();
        assert_eq!(decode_payment_response(encoded).unwrap(), response);
    }

    #[test]
    fn malformed_payment_header() {
        assert!(decode_payment_header("%%%").is_err());
    }
}
