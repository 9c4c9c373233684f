//! Client configuration.

use std::sync::Arc;

use crate::error::ClientError;
use crate::payment::PaymentProvider;
use crate::session::BrowserContext;
use crate::transport::Transport;

/// Configuration for a [`crate::Client`].
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Project scope (env: FORMSPREE_PROJECT). Submissions go to
    /// `/p/{project}/f/{form}` when set.
    pub project: Option<String>,
    /// Base URL (env: FORMSPREE_ENDPOINT, default: https://formspree.io).
    pub endpoint: Option<String>,
    /// Default client label (env: FORMSPREE_CLIENT_NAME).
    pub client_name: Option<String>,
    /// Payment provider for forms that take payments.
    pub stripe: Option<Arc<dyn PaymentProvider>>,
    /// Host event source for session telemetry.
    pub browser: Option<BrowserContext>,
    /// Default transport (default: reqwest).
    pub transport: Option<Arc<dyn Transport>>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let endpoint = var("FORMSPREE_ENDPOINT")
            .map(|endpoint| {
                url::Url::parse(&endpoint)
                    .map_err(|e| ClientError::Config(format!("invalid FORMSPREE_ENDPOINT: {e}")))?;
                Ok::<_, ClientError>(endpoint)
            })
            .transpose()?;

        Ok(Self {
            project: var("FORMSPREE_PROJECT"),
            endpoint,
            client_name: var("FORMSPREE_CLIENT_NAME"),
            ..Self::default()
        })
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn stripe(mut self, provider: impl PaymentProvider + 'static) -> Self {
        self.stripe = Some(Arc::new(provider));
        self
    }

    pub fn browser(mut self, context: BrowserContext) -> Self {
        self.browser = Some(context);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}
