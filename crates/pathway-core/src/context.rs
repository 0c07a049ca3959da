use secrecy::SecretString;

/// Per-request context carried from the handler down to providers
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation identifier, echoed in logs and routing events
    pub request_id: String,
    /// Calling client, when the platform identified one
    pub client_id: Option<String>,
    /// Caller-supplied provider key that overrides the configured one
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Create a context with a fresh request identifier
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            client_id: None,
            api_key: None,
        }
    }

    /// Reuse a caller-provided request identifier
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Attach the calling client
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
