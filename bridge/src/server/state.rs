//! Server state

use std::net::IpAddr;
use std::sync::Arc;

use crate::filesys::file::File;
use crate::http::api::DeviceApi;
use crate::store::StateStore;
use crate::sync::syncer::Syncer;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn StateStore>,
    pub api: Arc<dyn DeviceApi>,
    pub syncer: Arc<Syncer>,

    /// Only this source may call back unless `listen_all` is set
    pub device_address: String,
    pub listen_all: bool,

    /// Latest snapshot on disk, if kept
    pub snapshot_file: Option<File>,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn StateStore>,
        api: Arc<dyn DeviceApi>,
        syncer: Arc<Syncer>,
        device_address: impl Into<String>,
        listen_all: bool,
    ) -> Self {
        Self {
            store,
            api,
            syncer,
            device_address: device_address.into(),
            listen_all,
            snapshot_file: None,
        }
    }

    pub fn with_snapshot_file(mut self, file: File) -> Self {
        self.snapshot_file = Some(file);
        self
    }

    /// Whether a callback from `remote` is accepted
    pub fn accepts(&self, remote: IpAddr) -> bool {
        // IPv4 peers on a dual-stack socket show up as ::ffff:a.b.c.d
        self.listen_all || remote.to_canonical().to_string() == self.device_address
    }
}
