//! Relay server node listing and event streams.

use std::collections::HashMap;

use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{http, HttpError};

/// Session of a node connected to the relay server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySession {
    #[serde(default)]
    pub peer: Option<String>,

    #[serde(default)]
    pub seen: Option<Value>,
}

/// Node presence derived from a relay listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayNode {
    pub node_id: String,
    pub online: bool,

    /// Public address of the first session, if it is well-formed.
    pub address: Option<(String, i32)>,
}

fn normalize(node_id: &str) -> String {
    node_id.trim().to_lowercase()
}

fn peer_address(peer: &str) -> Option<(String, i32)> {
    let (ip, port) = peer.rsplit_once(':')?;
    let port = port.parse().ok()?;

    (!ip.is_empty()).then(|| (ip.to_owned(), port))
}

/// Interpret a single listing page.
///
/// A node is online if any of its sessions was seen.
pub fn relay_nodes(listing: HashMap<String, Vec<RelaySession>>) -> Vec<RelayNode> {
    listing
        .into_iter()
        .filter(|(_, sessions)| !sessions.is_empty())
        .map(|(node_id, sessions)| RelayNode {
            node_id: normalize(&node_id),
            online: sessions.iter().any(|session| session.seen.is_some()),
            address: sessions[0].peer.as_deref().and_then(peer_address),
        })
        .collect()
}

/// Kind of a relay event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEventKind {
    NewNode,
    LostNode,
}

impl RelayEventKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "new-node" => Some(Self::NewNode),
            "lost-node" => Some(Self::LostNode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub kind: RelayEventKind,
    pub node_id: String,
}

/// Line-oriented parser of `event:` and `data:` pairs.
#[derive(Debug, Default)]
pub struct EventParser {
    pending: Option<RelayEventKind>,
}

impl EventParser {
    pub fn push_line(&mut self, line: &str) -> Option<RelayEvent> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(name) = line.strip_prefix("event:") {
            self.pending = RelayEventKind::parse(name.trim());
            return None;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let kind = self.pending.take()?;
            let node_id = normalize(data);

            return (!node_id.is_empty()).then_some(RelayEvent { kind, node_id });
        }

        None
    }
}

/// Relay server client.
pub struct RelayClient {
    client: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(client: reqwest::Client, config: &common::config::Relay) -> Self {
        Self {
            client,
            url: config.url.trim_end_matches('/').to_owned(),
        }
    }

    /// List nodes whose identifier starts with the provided byte.
    pub async fn nodes(&self, prefix: u8) -> Result<Vec<RelayNode>, HttpError> {
        let listing: HashMap<String, Vec<RelaySession>> =
            http::json(self.client.get(format!("{}/nodes/{prefix:02x}", self.url))).await?;

        Ok(relay_nodes(listing))
    }

    /// Forward events of a single stream until it ends or fails.
    ///
    /// Returns `Ok` if the stream was closed by the server or the receiver
    /// was dropped.
    pub async fn listen(
        &self,
        url: &str,
        events: &mpsc::Sender<RelayEvent>,
    ) -> Result<(), HttpError> {
        let response = http::check(self.client.get(url).send().await?)?;
        let mut stream = response.bytes_stream();

        let mut parser = EventParser::default();
        let mut buffer = Vec::new();

        while let Some(chunk) = stream.try_next().await? {
            buffer.extend_from_slice(&chunk);

            while let Some(end) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();

                if let Some(event) = parser.push_line(&String::from_utf8_lossy(&line)) {
                    if events.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{relay_nodes, EventParser, RelayEvent, RelayEventKind, RelaySession};

    #[test]
    fn listing() {
        let listing: HashMap<String, Vec<RelaySession>> = serde_json::from_value(json!({
            " 0xAB01 ": [
                { "peer": "10.0.0.1:11500", "seen": "2024-01-01T00:00:00Z" }
            ],
            "0xab02": [
                { "peer": "invalid" },
                { "peer": "10.0.0.3:11500", "seen": "2024-01-01T00:00:00Z" }
            ],
            "0xab03": [{ "peer": "10.0.0.4:port" }],
            "0xab04": []
        }))
        .expect("valid listing");

        let mut nodes = relay_nodes(listing);
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        assert_eq!(nodes.len(), 3);

        assert_eq!(nodes[0].node_id, "0xab01");
        assert!(nodes[0].online);
        assert_eq!(nodes[0].address, Some((String::from("10.0.0.1"), 11500)));

        assert_eq!(nodes[1].node_id, "0xab02");
        assert!(nodes[1].online);
        assert_eq!(nodes[1].address, None);

        assert_eq!(nodes[2].node_id, "0xab03");
        assert!(!nodes[2].online);
        assert_eq!(nodes[2].address, None);
    }

    #[test]
    fn event_stream_lines() {
        let mut parser = EventParser::default();

        let lines = [
            "event: new-node\n",
            "data: 0xAAA\n",
            "\n",
            "data: 0xorphan\n",
            "event: heartbeat\n",
            "data: 0xignored\n",
            "event: lost-node\r\n",
            "data: 0xbbb\r\n",
        ];

        let events: Vec<RelayEvent> = lines
            .iter()
            .filter_map(|line| parser.push_line(line))
            .collect();

        assert_eq!(
            events,
            [
                RelayEvent {
                    kind: RelayEventKind::NewNode,
                    node_id: String::from("0xaaa"),
                },
                RelayEvent {
                    kind: RelayEventKind::LostNode,
                    node_id: String::from("0xbbb"),
                },
            ]
        );
    }
}
