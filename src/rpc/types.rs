use serde::{Deserialize, Serialize};

/// Network identity of a messaging runtime.
///
/// `port` is the actually bound port; a runtime started with port 0 reports
/// the kernel-assigned one here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RpcAddress {
    pub host: String,
    pub port: u16,
}

impl RpcAddress {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Base URL for HTTP requests against this runtime.
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for RpcAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
