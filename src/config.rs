//! # Configuration File Loader
//!
//! Parses the plain-text, whitespace-separated network description from
//! spec §6:
//!
//! ```text
//! <node_count>
//! (H|S|D) <id>           x node_count
//! <link_count>
//! (P <a> <b>) | (S <a> <localDomain> <localPort> <remoteDomain> <remotePort>)   x link_count
//! ```
//!
//! `H` = host, `S` = switch, `D` = name server, `P` = pipe link, the
//! second `S` = socket link (link-type `S` and node-type `S` share a
//! letter but occur in different positions, exactly as in spec §6).
//!
//! The grammar in spec §6 only lists `H`/`S` node tags, but the name
//! server (reserved id 100) still needs a port list wired up like any
//! other node to participate in STP and receive DNS packets. `D` extends
//! the closed tag set for that purpose; a malformed file is fatal at
//! startup, per spec §7.

use crate::error::NetsimError;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKindSpec {
    Host,
    Switch,
    NameServer,
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: u8,
    pub kind: NodeKindSpec,
}

#[derive(Debug, Clone)]
pub enum LinkSpec {
    Pipe { a: u8, b: u8 },
    Socket {
        a: u8,
        local_domain: String,
        local_port: u16,
        remote_domain: String,
        remote_port: u16,
    },
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
}

impl NetworkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetsimError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NetsimError::Config(format!("cannot read config file: {e}")))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, NetsimError> {
        let mut tokens = text.split_whitespace();

        let node_count = next_usize(&mut tokens, "node_count")?;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let tag = next_token(&mut tokens, "node kind (H/S/D)")?;
            let id = next_u8(&mut tokens, "node id")?;
            let kind = match tag {
                "H" => NodeKindSpec::Host,
                "S" => NodeKindSpec::Switch,
                "D" => NodeKindSpec::NameServer,
                other => {
                    return Err(NetsimError::Config(format!(
                        "unknown node kind tag '{other}', expected H, S, or D"
                    )))
                }
            };
            nodes.push(NodeSpec { id, kind });
        }

        let dense_ids: Vec<u8> = {
            let mut ids: Vec<u8> = nodes
                .iter()
                .filter(|n| n.kind != NodeKindSpec::NameServer)
                .map(|n| n.id)
                .collect();
            ids.sort_unstable();
            ids
        };
        for (expected, actual) in dense_ids.iter().enumerate() {
            if expected as u8 != *actual {
                return Err(NetsimError::Config(format!(
                    "host/switch ids must be dense starting at 0; found gap at id {expected}"
                )));
            }
        }

        let link_count = next_usize(&mut tokens, "link_count")?;
        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            let tag = next_token(&mut tokens, "link kind (P/S)")?;
            match tag {
                "P" => {
                    let a = next_u8(&mut tokens, "pipe link node a")?;
                    let b = next_u8(&mut tokens, "pipe link node b")?;
                    links.push(LinkSpec::Pipe { a, b });
                }
                "S" => {
                    let a = next_u8(&mut tokens, "socket link node")?;
                    let local_domain = next_token(&mut tokens, "local domain")?.to_string();
                    let local_port = next_u16(&mut tokens, "local port")?;
                    let remote_domain = next_token(&mut tokens, "remote domain")?.to_string();
                    let remote_port = next_u16(&mut tokens, "remote port")?;
                    links.push(LinkSpec::Socket {
                        a,
                        local_domain,
                        local_port,
                        remote_domain,
                        remote_port,
                    });
                }
                other => {
                    return Err(NetsimError::Config(format!(
                        "unknown link kind tag '{other}', expected P or S"
                    )))
                }
            }
        }

        Ok(Self { nodes, links })
    }

    pub fn node_ids_attached_to(&self, id: u8) -> Vec<u8> {
        self.links
            .iter()
            .filter_map(|l| match l {
                LinkSpec::Pipe { a, b } if *a == id => Some(*b),
                LinkSpec::Pipe { a, b } if *b == id => Some(*a),
                LinkSpec::Socket { a, .. } if *a == id => None, // peer resolved by domain, not id
                _ => None,
            })
            .collect()
    }
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<&'a str, NetsimError> {
    tokens
        .next()
        .ok_or_else(|| NetsimError::Config(format!("expected {what}, found end of file")))
}

fn next_usize<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<usize, NetsimError> {
    next_token(tokens, what)?
        .parse()
        .map_err(|_| NetsimError::Config(format!("expected {what} to be a number")))
}

fn next_u8<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<u8, NetsimError> {
    next_token(tokens, what)?
        .parse()
        .map_err(|_| NetsimError::Config(format!("expected {what} to be a node id (0-255)")))
}

fn next_u16<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<u16, NetsimError> {
    next_token(tokens, what)?
        .parse()
        .map_err(|_| NetsimError::Config(format!("expected {what} to be a port number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ping_topology() {
        let text = "3\nH 0\nS 1\nH 2\n2\nP 0 1\nP 1 2\n";
        let cfg = NetworkConfig::parse(text).unwrap();
        assert_eq!(cfg.nodes.len(), 3);
        assert_eq!(cfg.links.len(), 2);
        assert_eq!(cfg.nodes[1].kind, NodeKindSpec::Switch);
    }

    #[test]
    fn finds_pipe_neighbors_of_a_node() {
        let text = "3\nH 0\nS 1\nH 2\n2\nP 0 1\nP 1 2\n";
        let cfg = NetworkConfig::parse(text).unwrap();
        assert_eq!(cfg.node_ids_attached_to(1), vec![0, 2]);
        assert_eq!(cfg.node_ids_attached_to(0), vec![1]);
        assert!(cfg.node_ids_attached_to(2) == vec![1]);
    }

    #[test]
    fn parses_name_server_and_socket_link() {
        let text = "2\nH 0\nD 100\n1\nS 0 localhost 9000 localhost 9001\n";
        let cfg = NetworkConfig::parse(text).unwrap();
        assert_eq!(cfg.nodes[1].kind, NodeKindSpec::NameServer);
        match &cfg.links[0] {
            LinkSpec::Socket { local_port, remote_port, .. } => {
                assert_eq!(*local_port, 9000);
                assert_eq!(*remote_port, 9001);
            }
            _ => panic!("expected a socket link"),
        }
    }

    #[test]
    fn rejects_non_dense_ids() {
        let text = "2\nH 0\nH 2\n0\n";
        assert!(NetworkConfig::parse(text).is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        assert!(NetworkConfig::parse("3\nH 0\n").is_err());
    }
}
