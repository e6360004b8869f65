//! Resolution of published container ports to externally reachable addresses.
//!
//! Different runtime implementations report "listen on all interfaces"
//! differently; resolution tolerates the known quirks rather than silently
//! defaulting. No match is a hard, descriptive failure.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Host-side binding of one published container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Host IP the port is bound to. May be empty on some runtimes.
    pub host_ip: String,
    /// Host port as reported by the runtime.
    pub host_port: String,
}

impl PortBinding {
    /// Returns the binding as a `host:port` address.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host_ip, self.host_port)
    }
}

/// Published ports of a container, keyed by `<port>/<proto>` as reported by
/// the runtime (e.g. `80/tcp`).
pub type PortMap = HashMap<String, Vec<PortBinding>>;

/// Renders a TCP container port as a port map key.
#[must_use]
pub fn tcp_port_key(port: u16) -> String {
    format!("{port}/tcp")
}

/// Finds the host binding through which `port` is reachable at `host_bind_ip`.
///
/// Resolution rules, in order:
///
/// 1. A binding whose host IP equals `host_bind_ip` exactly is returned
///    verbatim.
/// 2. A binding reported as `0.0.0.0` listens on all interfaces, including
///    `host_bind_ip`; it is returned with its address rewritten.
/// 3. A binding with an empty host IP while `host_bind_ip` is the loopback
///    address is treated as an implicit loopback binding (observed with at
///    least one Podman release).
///
/// # Errors
///
/// - The port is not published at all
/// - The port is published with an empty binding list
/// - No binding satisfies any of the three rules
pub fn resolve_port(ports: &PortMap, host_bind_ip: &str, port: u16) -> Result<PortBinding> {
    let key = tcp_port_key(port);
    let bindings = ports.get(&key).ok_or_else(|| Error::PortNotExposed {
        port: key.clone(),
        published: format!("{:?}", ports.keys().collect::<Vec<_>>()),
    })?;
    if bindings.is_empty() {
        return Err(Error::PortUnbound { port: key });
    }

    for binding in bindings {
        if binding.host_ip == host_bind_ip {
            return Ok(binding.clone());
        }
        if binding.host_ip == "0.0.0.0" {
            return Ok(PortBinding {
                host_ip: host_bind_ip.to_string(),
                host_port: binding.host_port.clone(),
            });
        }
        if binding.host_ip.is_empty() && host_bind_ip == "127.0.0.1" {
            return Ok(PortBinding {
                host_ip: host_bind_ip.to_string(),
                host_port: binding.host_port.clone(),
            });
        }
    }

    Err(Error::PortNoMatch {
        host_ip: host_bind_ip.to_string(),
        port: key,
        bindings: format!("{bindings:?}"),
    })
}
