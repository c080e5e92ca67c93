use crate::config::keys;
use crate::config::settings::EngineConfig;

/// Node security context.
///
/// Holds the optional shared secret protecting the messaging runtime and
/// the file server. With no secret configured every request is accepted.
pub struct SecurityManager {
    secret: Option<String>,
}

impl SecurityManager {
    pub fn new(config: &EngineConfig) -> Self {
        let secret = config.get(keys::AUTH_SECRET);
        if secret.is_some() {
            tracing::info!("Messaging authentication enabled");
        } else {
            tracing::debug!("Messaging authentication disabled");
        }
        Self { secret }
    }

    pub fn auth_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Token outbound requests must attach, if any.
    pub fn token(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Validates a presented token against the configured secret.
    pub fn check(&self, presented: Option<&str>) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => presented == Some(secret.as_str()),
        }
    }
}
