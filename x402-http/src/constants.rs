//! HTTP-specific constants for x402.

/// Request header carrying the signed payment (client to server).
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the settlement result (server to client).
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// CORS header listing response headers a browser may read.
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";

/// Public facilitator used when none is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Error text of a `402` sent to a request without `X-PAYMENT`.
pub const PAYMENT_HEADER_REQUIRED: &str = "X-PAYMENT header is required";
