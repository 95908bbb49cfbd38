//! Node discovery for sniffing sessions.
//!
//! The pool starts with the configured endpoint and is reseeded from the
//! cluster's `_nodes/http` answer; requests are spread round-robin over the
//! discovered nodes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opensearch::http::transport::{Connection, ConnectionPool};
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

/// Round-robin pool over the HTTP nodes of a cluster.
///
/// Clones share the same node list, so the copy handed to the transport sees
/// every reseed.
#[derive(Debug, Clone)]
pub struct SniffingConnectionPool {
    seed: Url,
    nodes: Arc<RwLock<Vec<Connection>>>,
    cursor: Arc<AtomicUsize>,
}

impl SniffingConnectionPool {
    pub fn new(seed: Url) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(vec![Connection::new(seed.clone())])),
            seed,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the node list. An empty list falls back to the seed endpoint.
    pub fn reseed(&self, urls: Vec<Url>) -> usize {
        let mut connections: Vec<Connection> = urls.into_iter().map(Connection::new).collect();
        if connections.is_empty() {
            connections.push(Connection::new(self.seed.clone()));
        }

        let count = connections.len();
        *self.nodes.write() = connections;
        count
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }
}

impl ConnectionPool for SniffingConnectionPool {
    fn next(&self) -> Connection {
        let nodes = self.nodes.read();
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % nodes.len().max(1);
        match nodes.get(slot) {
            Some(connection) => connection.clone(),
            None => Connection::new(self.seed.clone()),
        }
    }
}

/// Node URLs from a `_nodes/http` response, using the seed's scheme.
///
/// `publish_address` is either `host:port` or `hostname/ip:port`; the
/// hostname wins when present. Nodes without an HTTP section are skipped.
pub fn parse_http_nodes(response: &Value, scheme: &str) -> Vec<Url> {
    let Some(nodes) = response.get("nodes").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut urls: Vec<Url> = nodes
        .values()
        .filter_map(|node| node.pointer("/http/publish_address")?.as_str())
        .filter_map(|address| publish_address_url(address, scheme))
        .collect();
    urls.sort();
    urls.dedup();
    urls
}

fn publish_address_url(address: &str, scheme: &str) -> Option<Url> {
    let port = address.rsplit_once(':')?.1;
    let host = match address.split_once('/') {
        Some((hostname, _)) if !hostname.is_empty() => hostname,
        Some((_, ip)) => ip.rsplit_once(':')?.0,
        None => address.rsplit_once(':')?.0,
    };
    Url::parse(&format!("{scheme}://{host}:{port}")).ok()
}
