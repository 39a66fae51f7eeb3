//! Peer addresses
//!
//! `host`, `host:port`, `tcp://host[:port]` and `ws://host[:port]`. The port
//! defaults to [`CORE_PORT`].

use crate::config::CORE_PORT;
use anyhow::{anyhow, bail};
use lrv_client::Protocol;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            host: host.into(),
            port,
        }
    }

    pub fn websocket(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: Protocol::WebSocket,
            host: host.into(),
            port,
        }
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Tcp => write!(f, "{}:{}", self.host, self.port),
            Protocol::WebSocket => write!(f, "{}", self.url()),
        }
    }
}

impl FromStr for PeerAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (protocol, rest) = if let Some(rest) = s.strip_prefix("ws://") {
            (Protocol::WebSocket, rest)
        } else if let Some(rest) = s.strip_prefix("tcp://") {
            (Protocol::Tcp, rest)
        } else if s.contains("://") {
            bail!("unsupported peer protocol in {:?}", s);
        } else {
            (Protocol::Tcp, s)
        };

        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| anyhow!("invalid port in peer address {:?}", s))?,
            ),
            None => (rest, CORE_PORT),
        };
        if host.is_empty() {
            bail!("missing host in peer address {:?}", s);
        }

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
        })
    }
}
