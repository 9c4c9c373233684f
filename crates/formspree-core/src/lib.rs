//! Formspree form-submission client.
//!
//! Submits JSON or multipart form data to Formspree, optionally attaching
//! session telemetry and optionally confirming a Stripe payment, including
//! SCA challenges and the resubmission they require.
//!
//! # Quick example
//!
//! ```no_run
//! use formspree::{create_client, ClientConfig, SubmissionData, SubmissionOptions};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let client = create_client(ClientConfig::new().project("111"));
//! let data = SubmissionData::from_json(serde_json::json!({ "email": "a@b.c" })).unwrap();
//!
//! let result = client
//!     .submit_form("newsletter", &data, &SubmissionOptions::new())
//!     .await
//!     .unwrap();
//!
//! if let Some(errors) = result.body.as_errors() {
//!     for error in errors.form_errors() {
//!         println!("{}", error.message);
//!     }
//! }
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod forms;
pub mod payment;
pub mod request;
pub mod session;
pub mod transport;
pub mod utils;

pub use client::{create_client, Client, SubmissionOptions};
pub use config::ClientConfig;
pub use constants::*;
pub use error::ClientError;
pub use forms::*;
pub use payment::{CreatePaymentMethod, PaymentIntent, PaymentMethod, PaymentProvider, ProviderError};
pub use request::{FormRequest, RequestBody, RequestMode};
pub use session::{
    ActivityHub, ActivityKind, AutomationSignals, BrowserContext, EventSource, SessionSnapshot,
};
pub use transport::{ReqwestTransport, ResponseMeta, Transport, TransportResponse};
