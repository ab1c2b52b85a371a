use crate::error::ResolveError;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};

/// Resolves `host[:port]` strings into endpoints.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(
        &self,
        host_port: &str,
        default_port: u16,
    ) -> Result<Vec<SocketAddr>, ResolveError>;
}

/// Split `host[:port]`, accepting `[v6]:port` and bare IPv6 literals
pub fn split_host_port(host_port: &str, default_port: u16) -> Result<(String, u16), ResolveError> {
    let input = host_port.trim();
    if input.is_empty() {
        return Err(ResolveError::InvalidAddress(host_port.to_string()));
    }

    if let Some(rest) = input.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ResolveError::InvalidAddress(host_port.to_string()))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(p, host_port)?,
            None if tail.is_empty() => default_port,
            None => return Err(ResolveError::InvalidAddress(host_port.to_string())),
        };
        return Ok((host.to_string(), port));
    }

    // More than one colon without brackets can only be a bare IPv6 literal
    if input.matches(':').count() > 1 {
        return Ok((input.to_string(), default_port));
    }

    match input.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port, host_port)?)),
        Some(_) => Err(ResolveError::InvalidAddress(host_port.to_string())),
        None => Ok((input.to_string(), default_port)),
    }
}

fn parse_port(port: &str, original: &str) -> Result<u16, ResolveError> {
    port.parse::<u16>()
        .map_err(|_| ResolveError::InvalidAddress(original.to_string()))
}

/// Resolver backed by the system's name service
pub struct DnsResolver {
    allow_name_lookup: bool,
}

impl DnsResolver {
    pub fn new(allow_name_lookup: bool) -> Self {
        Self { allow_name_lookup }
    }
}

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(
        &self,
        host_port: &str,
        default_port: u16,
    ) -> Result<Vec<SocketAddr>, ResolveError> {
        let (host, port) = split_host_port(host_port, default_port)?;

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        if !self.allow_name_lookup {
            return Err(ResolveError::LookupDisabled(host));
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| ResolveError::LookupFailed {
                host: host.clone(),
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ResolveError::LookupFailed {
                host,
                reason: "no addresses".to_string(),
            });
        }
        Ok(addrs)
    }
}
