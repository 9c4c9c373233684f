use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::constants::DEFAULT_ENDPOINT;
use crate::error::ClientError;
use crate::forms::{SubmissionBody, SubmissionData, SubmissionResponse};
use crate::payment::{confirm_payment, CreatePaymentMethod, PaymentProvider};
use crate::request::{build_request, submission_url};
use crate::session::{BrowserContext, Session, SessionSnapshot};
use crate::transport::{ReqwestTransport, ResponseMeta, Transport};

/// Per-submission options.
#[derive(Clone, Default)]
pub struct SubmissionOptions {
    /// Base URL override.
    pub endpoint: Option<String>,
    /// Label prepended to the `Formspree-Client` header.
    pub client_name: Option<String>,
    /// Transport override, mainly for tests.
    pub transport: Option<Arc<dyn Transport>>,
    /// Produces the payment method when the form takes payments.
    pub create_payment_method: Option<Arc<dyn CreatePaymentMethod>>,
}

impl SubmissionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn create_payment_method(mut self, callback: impl CreatePaymentMethod + 'static) -> Self {
        self.create_payment_method = Some(Arc::new(callback));
        self
    }
}

/// One POST to the submission URL: build, send, decode.
pub(crate) struct RoundTrip<'a> {
    transport: &'a dyn Transport,
    url: String,
    form_key: &'a str,
    client_name: Option<&'a str>,
    session: Option<Arc<Session>>,
}

impl RoundTrip<'_> {
    pub(crate) fn form_key(&self) -> &str {
        self.form_key
    }

    pub(crate) async fn send(
        &self,
        data: &SubmissionData,
    ) -> Result<(ResponseMeta, Value), ClientError> {
        let snapshot = self.session.as_ref().map(|s| s.snapshot()).transpose()?;
        let request = build_request(data, self.client_name, snapshot.as_ref())?;

        tracing::debug!(url = %self.url, multipart = data.is_multipart(), "submitting form");
        let response = self.transport.send(&self.url, request).await?;
        let body = response.json()?;
        tracing::debug!(url = %self.url, status = response.meta.status, "form response received");

        Ok((response.meta, body))
    }
}

/// Formspree client.
///
/// Owns the browser session (if any) and the default transport. Construct
/// one per application and call [`Client::teardown`] when done.
pub struct Client {
    project: Option<String>,
    endpoint: String,
    client_name: Option<String>,
    stripe: Option<Arc<dyn PaymentProvider>>,
    browser: Option<BrowserContext>,
    session: Mutex<Option<Arc<Session>>>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client. A session is started right away when the config
    /// carries a browser context.
    pub fn new(config: ClientConfig) -> Self {
        let client = Self {
            project: config.project,
            endpoint: config
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client_name: config.client_name,
            stripe: config.stripe,
            browser: config.browser,
            session: Mutex::new(None),
            transport: config
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
        };

        if client.browser.is_some() {
            if let Err(e) = client.start_browser_session() {
                tracing::warn!(error = %e, "failed to start browser session");
            }
        }
        client
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn session_slot(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("client session mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Start tracking the browser session. Repeated calls reuse the running
    /// session.
    pub fn start_browser_session(&self) -> Result<(), ClientError> {
        let context = self.browser.as_ref().ok_or(ClientError::NoBrowserContext)?;
        let mut slot = self.session_slot();
        match slot.as_ref() {
            Some(session) => session.start(),
            None => {
                let session = Arc::new(Session::new(context.clone()));
                session.start()?;
                *slot = Some(session);
                Ok(())
            }
        }
    }

    /// Snapshot of the current session, `None` if no session was started.
    pub fn session_snapshot(&self) -> Result<Option<SessionSnapshot>, ClientError> {
        self.session_slot()
            .as_ref()
            .map(|s| s.snapshot())
            .transpose()
    }

    /// Tear down the session. Safe to call repeatedly. Submitting after a
    /// session was torn down fails with [`ClientError::SessionTornDown`].
    pub fn teardown(&self) {
        if let Some(session) = self.session_slot().as_ref() {
            session.stop();
        }
    }

    /// Submit a form.
    ///
    /// Validation and payment failures come back as an error envelope in
    /// `Ok`; only transport failures and API misuse return `Err`. `data` is
    /// never modified.
    pub async fn submit_form(
        &self,
        form_key: &str,
        data: &SubmissionData,
        options: &SubmissionOptions,
    ) -> Result<SubmissionResponse, ClientError> {
        if form_key.trim().is_empty() {
            return Err(ClientError::MissingFormKey);
        }

        let endpoint = options.endpoint.as_deref().unwrap_or(&self.endpoint);
        let transport = options.transport.as_deref().unwrap_or(self.transport.as_ref());
        let round_trip = RoundTrip {
            transport,
            url: submission_url(endpoint, self.project.as_deref(), form_key),
            form_key,
            client_name: options
                .client_name
                .as_deref()
                .or(self.client_name.as_deref()),
            session: self.session_slot().clone(),
        };

        if let (Some(stripe), Some(create)) = (&self.stripe, &options.create_payment_method) {
            return confirm_payment(&round_trip, stripe.as_ref(), create.as_ref(), data).await;
        }

        let (meta, value) = round_trip.send(data).await?;
        Ok(SubmissionResponse {
            body: SubmissionBody::from_value(value),
            response: Some(meta),
        })
    }
}

/// Construct a client.
pub fn create_client(config: ClientConfig) -> Client {
    Client::new(config)
}
