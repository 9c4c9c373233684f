/// Package label sent in the `Formspree-Client` header.
pub const PRODUCT: &str = "@formspree/core";

/// Crate version, appended to [`PRODUCT`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default collection endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://formspree.io";

/// Upper bound on resubmissions after SCA challenges within one submission.
pub const MAX_RESUBMISSIONS: u32 = 5;

pub const CLIENT_HEADER: &str = "Formspree-Client";
pub const SESSION_DATA_HEADER: &str = "Formspree-Session-Data";

/// Field names injected into the submission during the payment flow.
pub const PAYMENT_METHOD_FIELD: &str = "paymentMethod";
pub const PAYMENT_INTENT_FIELD: &str = "paymentIntent";
pub const RESUBMIT_KEY_FIELD: &str = "resubmitKey";
