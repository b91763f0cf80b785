//! Public-address boundary — how the coordinator reaches this agent.
//!
//! The tunnel mechanism itself (ngrok or similar) lives outside this core;
//! the runtime only needs something that can answer "what URL should the
//! heartbeat advertise?".

/// Opaque provider of the agent's externally reachable URL.
pub trait PublicUrlProvider: Send + Sync {
    /// The current public URL, if a tunnel is up.
    fn public_url(&self) -> Option<String>;
}

/// Fixed URL handed in at startup (or none, when running without a tunnel).
pub struct StaticUrl {
    url: Option<String>,
}

impl StaticUrl {
    pub fn new(url: Option<String>) -> Self {
        // An empty string in stored config means "no tunnel".
        let url = url.filter(|u| !u.is_empty());
        Self { url }
    }
}

impl PublicUrlProvider for StaticUrl {
    fn public_url(&self) -> Option<String> {
        self.url.clone()
    }
}

/// The URL the heartbeat advertises: the provider's answer, or the local
/// listener address when no tunnel is up.
pub fn advertised_url(provider: &dyn PublicUrlProvider, local_port: u16) -> String {
    provider
        .public_url()
        .unwrap_or_else(|| format!("http://localhost:{local_port}"))
}
