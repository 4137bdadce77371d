//! Client session settings.

use huddle_core::{ClientName, DomainResult};

/// Where to connect and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name to register with the server
    pub name: ClientName,

    /// Server host name or address
    pub host: String,

    /// Server TCP port
    pub port: u16,
}

impl SessionConfig {
    /// Builds a configuration, validating the client name.
    pub fn new(name: &str, host: impl Into<String>, port: u16) -> DomainResult<Self> {
        Ok(Self {
            name: ClientName::parse(name)?,
            host: host.into(),
            port,
        })
    }

    /// `host:port`, for messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
