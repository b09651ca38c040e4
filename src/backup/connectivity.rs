// mongodumptool/src/backup/connectivity.rs
use std::fmt;

use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::errors::DumpError;

pub const DEFAULT_MONGO_PORT: u16 = 27017;

/// One `host:port` pair from the authority section of a connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Whether the URI names hosts directly or a DNS seed list.
pub fn is_srv_uri(uri: &str) -> bool {
    uri.starts_with("mongodb+srv://")
}

/// Extracts every endpoint from a connection URI of the form
/// `mongodb://[user:pass@]host1[:port1][,host2[:port2],...][/db][?options]`.
pub fn parse_endpoints(uri: &str) -> Result<Vec<ConnectionEndpoint>, DumpError> {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let hosts = authority.rsplit_once('@').map_or(authority, |(_, hosts)| hosts);

    if hosts.is_empty() {
        return Err(DumpError::InvalidUri("no hosts in connection string".to_string()));
    }

    hosts.split(',').map(parse_host).collect()
}

fn parse_host(entry: &str) -> Result<ConnectionEndpoint, DumpError> {
    let entry = entry.trim();
    let (host, port) = if let Some(bracketed) = entry.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| DumpError::InvalidUri(format!("unterminated IPv6 literal \"{}\"", entry)))?;
        (host, tail.strip_prefix(':'))
    } else {
        match entry.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (entry, None),
        }
    };

    if host.is_empty() {
        return Err(DumpError::InvalidUri(format!("empty host in \"{}\"", entry)));
    }

    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| DumpError::InvalidUri(format!("invalid port \"{}\" for host {}", port, host)))?,
        None => DEFAULT_MONGO_PORT,
    };

    Ok(ConnectionEndpoint {
        host: host.to_string(),
        port,
    })
}

/// Single pass over the endpoints, stopping at the first one that accepts a
/// TCP connection.
pub async fn check_connectivity(endpoints: &[ConnectionEndpoint]) -> bool {
    for endpoint in endpoints {
        match TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await {
            Ok(_) => {
                info!("MongoDB is serving at {}", endpoint);
                return true;
            }
            Err(e) => {
                error!("MongoDB is not serving at {}: {}", endpoint, e);
            }
        }
    }
    false
}

/// Parses the URI and probes its hosts. `mongodb+srv://` URIs name a DNS
/// record instead of sockets and are left to mongodump to resolve.
pub async fn verify_uri(uri: &str) -> Result<(), DumpError> {
    if is_srv_uri(uri) {
        warn!("Connection string uses a DNS seed list, skipping TCP liveness probe");
        return Ok(());
    }

    let endpoints = parse_endpoints(uri)?;
    debug!("Probing {} MongoDB endpoint(s)", endpoints.len());
    if check_connectivity(&endpoints).await {
        Ok(())
    } else {
        let list = endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(DumpError::Unreachable(list))
    }
}
