// src/services/transport.rs
//
// Named UDP endpoints: client destinations and listening servers.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, Error, Result};
use crate::models::{decode_packet, encode_bundle, Message};

/// Largest datagram read from a server socket.
pub const MAX_DATAGRAM_SIZE: usize = rosc::decoder::MTU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Send capable: an outbound destination.
    Client,
    /// Receive capable: a bound listening socket.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub role: Role,
    /// Destination for clients, bound local address for servers.
    pub addr: SocketAddr,
}

/// A message read during a processing step.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub endpoint: String,
    pub from: SocketAddr,
    pub message: Message,
}

enum Binding {
    Client { target: SocketAddr },
    Server { socket: UdpSocket, port: u16 },
}

pub struct TransportRegistry {
    endpoints: BTreeMap<String, Binding>,
    sender_v4: Option<UdpSocket>,
    sender_v6: Option<UdpSocket>,
    buf: Vec<u8>,
    closed: bool,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            sender_v4: None,
            sender_v6: None,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
            closed: false,
        }
    }

    pub fn register_client(&mut self, name: &str, host: &str, port: u16) -> Result<SocketAddr> {
        self.check_open()?;
        self.check_name(name)?;

        let target = resolve(name, host, port)?;
        self.endpoints
            .insert(name.to_string(), Binding::Client { target });
        info!("OSC client {} -> {}", name, target);
        Ok(target)
    }

    pub fn register_server(
        &mut self,
        name: &str,
        bind_host: &str,
        port: u16,
    ) -> Result<SocketAddr> {
        self.check_open()?;
        self.check_name(name)?;

        if port != 0 {
            let owner = self.endpoints.iter().find_map(|(owner, binding)| match binding {
                Binding::Server { port: bound, .. } if *bound == port => Some(owner.clone()),
                _ => None,
            });
            if let Some(owner) = owner {
                return Err(ConfigurationError::PortInUse { port, owner }.into());
            }
        }

        let bind_error = |source| ConfigurationError::Bind {
            name: name.to_string(),
            addr: format!("{}:{}", bind_host, port),
            source,
        };
        let socket = UdpSocket::bind((bind_host, port)).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;
        let local = socket.local_addr().map_err(bind_error)?;

        self.endpoints.insert(
            name.to_string(),
            Binding::Server {
                socket,
                port: local.port(),
            },
        );
        info!("OSC server {} listening on {}", name, local);
        Ok(local)
    }

    pub fn send(&mut self, name: &str, message: &Message) -> Result<usize> {
        let bytes = message.encode()?;
        self.send_bytes(name, &bytes)
    }

    pub fn send_bundle(
        &mut self,
        name: &str,
        messages: &[Message],
        timetag: rosc::OscTime,
    ) -> Result<usize> {
        let bytes = encode_bundle(messages, timetag)?;
        self.send_bytes(name, &bytes)
    }

    fn send_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<usize> {
        self.check_open()?;
        let target = match self.endpoints.get(name) {
            Some(Binding::Client { target }) => *target,
            Some(Binding::Server { .. }) => {
                return Err(ConfigurationError::NotSendCapable {
                    name: name.to_string(),
                }
                .into())
            }
            None => {
                return Err(ConfigurationError::UnknownEndpoint {
                    name: name.to_string(),
                }
                .into())
            }
        };

        let socket = self.sender_for(name, target)?;
        let sent = socket.send_to(bytes, target).map_err(|source| Error::Transport {
            endpoint: name.to_string(),
            peer: Some(target),
            source,
        })?;
        debug!("Sent {} bytes to {} ({})", sent, name, target);
        Ok(sent)
    }

    fn sender_for(&mut self, name: &str, target: SocketAddr) -> Result<&UdpSocket> {
        let (slot, unspecified) = if target.is_ipv4() {
            (&mut self.sender_v4, "0.0.0.0:0")
        } else {
            (&mut self.sender_v6, "[::]:0")
        };

        if slot.is_none() {
            let socket = UdpSocket::bind(unspecified).map_err(|source| Error::Transport {
                endpoint: name.to_string(),
                peer: None,
                source,
            })?;
            debug!("Bound OSC send socket on {:?}", socket.local_addr().ok());
            *slot = Some(socket);
        }

        slot.as_ref().ok_or(Error::Closed)
    }

    /// One bounded, non-blocking pass over every server socket. Reads at
    /// most `limit` datagrams in total; malformed datagrams are skipped.
    pub fn poll(&mut self, limit: usize) -> Result<Vec<Inbound>> {
        self.check_open()?;

        let mut inbound = Vec::new();
        let mut datagrams = 0;
        for (name, binding) in self.endpoints.iter() {
            let Binding::Server { socket, .. } = binding else {
                continue;
            };

            while datagrams < limit {
                let (size, from) = match socket.recv_from(&mut self.buf) {
                    Ok(received) => received,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    // ICMP port-unreachable from an earlier send, reported on some platforms
                    Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                    Err(source) => {
                        return Err(Error::Transport {
                            endpoint: name.clone(),
                            peer: None,
                            source,
                        })
                    }
                };
                datagrams += 1;

                match decode_packet(&self.buf[..size]) {
                    Ok(messages) => inbound.extend(messages.into_iter().map(|message| Inbound {
                        endpoint: name.clone(),
                        from,
                        message,
                    })),
                    Err(e) => warn!("Dropping malformed OSC packet from {}: {:?}", from, e),
                }
            }
        }

        Ok(inbound)
    }

    pub fn local_addr(&self, name: &str) -> Result<SocketAddr> {
        match self.endpoints.get(name) {
            Some(Binding::Server { socket, .. }) => {
                socket.local_addr().map_err(|source| Error::Transport {
                    endpoint: name.to_string(),
                    peer: None,
                    source,
                })
            }
            Some(Binding::Client { target }) => Ok(*target),
            None => Err(ConfigurationError::UnknownEndpoint {
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter_map(|(name, binding)| {
                let (role, addr) = match binding {
                    Binding::Client { target } => (Role::Client, *target),
                    Binding::Server { socket, .. } => (Role::Server, socket.local_addr().ok()?),
                };
                Some(Endpoint {
                    name: name.clone(),
                    role,
                    addr,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases every socket. Returns how many were released; a second call
    /// releases nothing.
    pub fn close(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;

        let servers = self
            .endpoints
            .values()
            .filter(|binding| matches!(binding, Binding::Server { .. }))
            .count();
        let senders =
            self.sender_v4.take().is_some() as usize + self.sender_v6.take().is_some() as usize;
        self.endpoints.clear();

        info!("Released {} OSC sockets", servers + senders);
        servers + senders
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.endpoints.contains_key(name) {
            return Err(ConfigurationError::DuplicateEndpoint {
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Drop for TransportRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(name: &str, host: &str, port: u16) -> Result<SocketAddr> {
    let resolve_error = |source| ConfigurationError::Resolve {
        name: name.to_string(),
        host: host.to_string(),
        port,
        source,
    };

    let mut addrs = (host, port).to_socket_addrs().map_err(|e| resolve_error(Some(e)))?;
    Ok(addrs.next().ok_or_else(|| resolve_error(None))?)
}
