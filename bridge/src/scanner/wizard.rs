//! UDP discovery wizard
//!
//! Devices broadcast a long announcement followed by a short one of the
//! form `<prefix>:<identifier>`. The first sender of a long datagram is
//! remembered; its next short datagram names the device.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::errors::BridgeError;

/// Port devices announce themselves on
pub const DISCOVERY_PORT: u16 = 6524;

/// How long a discovery run listens
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(60);

/// Datagrams longer than this open a discovery; shorter ones complete it
const ANNOUNCE_LEN: usize = 25;

/// A device found by the wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub address: IpAddr,
    pub identifier: String,
}

/// Pairs the announcement datagrams of a single device
#[derive(Debug, Default)]
pub struct Collector {
    sender: Option<IpAddr>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one datagram; returns the device once its identifier is known
    pub fn feed(&mut self, from: IpAddr, datagram: &[u8]) -> Option<DiscoveredDevice> {
        if self.sender.is_none() && datagram.len() > ANNOUNCE_LEN {
            debug!("Discovery announcement from {}", from);
            self.sender = Some(from);
            return None;
        }
        if self.sender != Some(from) || datagram.len() >= ANNOUNCE_LEN {
            return None;
        }

        let text = String::from_utf8_lossy(datagram);
        let identifier = text.split(':').nth(1)?.trim();
        if identifier.is_empty() {
            return None;
        }
        Some(DiscoveredDevice {
            address: from,
            identifier: identifier.to_string(),
        })
    }
}

/// Runs discoveries, one at a time
pub struct Wizard {
    bind_addr: SocketAddr,
    window: Duration,
    busy: AtomicBool,
}

/// Clears the busy flag when a run ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Wizard {
    pub fn new(bind_addr: SocketAddr, window: Duration) -> Self {
        Self {
            bind_addr,
            window,
            busy: AtomicBool::new(false),
        }
    }

    /// Listen for a device until one is found or the window closes
    pub async fn discover(&self) -> Result<DiscoveredDevice, BridgeError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::WizardBusy);
        }
        let _guard = BusyGuard(&self.busy);

        let socket = UdpSocket::bind(self.bind_addr).await?;
        info!("Wizard listening on {}", socket.local_addr()?);

        match tokio::time::timeout(self.window, listen(&socket)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Wizard timeout");
                Err(BridgeError::WizardTimeout(self.window))
            }
        }
    }
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DISCOVERY_PORT),
            DISCOVERY_WINDOW,
        )
    }
}

async fn listen(socket: &UdpSocket) -> Result<DiscoveredDevice, BridgeError> {
    let mut collector = Collector::new();
    let mut buf = [0u8; 1024];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        if let Some(device) = collector.feed(from.ip(), &buf[..len]) {
            info!("Discovered device {} at {}", device.identifier, device.address);
            return Ok(device);
        }
    }
}
