//! Device API contract

use async_trait::async_trait;

use crate::errors::BridgeError;
use crate::http::client::DeviceClient;
use crate::models::favorite::{FavoriteId, RemoteFavorite};
use crate::models::info::DeviceInfo;
use crate::models::schedule::ScheduleEntry;

/// One operation per device capability. Implemented by [`DeviceClient`]
/// and by in-memory fakes in tests.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// List HTTP favorites in device order
    async fn list_favorites(&self) -> Result<Vec<RemoteFavorite>, BridgeError>;

    /// Store a new favorite; the device assigns the id
    async fn create_favorite(&self, title: &str, target_url: &str) -> Result<(), BridgeError>;

    /// Overwrite an existing favorite
    async fn update_favorite(
        &self,
        id: &FavoriteId,
        title: &str,
        target_url: &str,
    ) -> Result<(), BridgeError>;

    async fn delete_favorite(&self, id: &FavoriteId) -> Result<(), BridgeError>;

    /// List schedule entries. Also serves as the health probe.
    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, BridgeError>;

    /// Replace the whole entry for its input
    async fn replace_schedule(&self, entry: &ScheduleEntry) -> Result<(), BridgeError>;

    async fn info(&self) -> Result<DeviceInfo, BridgeError>;

    /// Trigger relay `relay`
    async fn open_door(&self, relay: &str) -> Result<(), BridgeError>;

    async fn restart(&self) -> Result<(), BridgeError>;

    async fn light_on(&self) -> Result<(), BridgeError>;

    /// Current camera image as JPEG
    async fn snapshot(&self) -> Result<Vec<u8>, BridgeError>;
}

#[async_trait]
impl DeviceApi for DeviceClient {
    async fn list_favorites(&self) -> Result<Vec<RemoteFavorite>, BridgeError> {
        self.fetch_favorites().await
    }

    async fn create_favorite(&self, title: &str, target_url: &str) -> Result<(), BridgeError> {
        self.save_favorite(None, title, target_url).await
    }

    async fn update_favorite(
        &self,
        id: &FavoriteId,
        title: &str,
        target_url: &str,
    ) -> Result<(), BridgeError> {
        self.save_favorite(Some(id), title, target_url).await
    }

    async fn delete_favorite(&self, id: &FavoriteId) -> Result<(), BridgeError> {
        self.remove_favorite(id).await
    }

    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, BridgeError> {
        self.fetch_schedule().await
    }

    async fn replace_schedule(&self, entry: &ScheduleEntry) -> Result<(), BridgeError> {
        self.submit_schedule(entry).await
    }

    async fn info(&self) -> Result<DeviceInfo, BridgeError> {
        self.fetch_info().await
    }

    async fn open_door(&self, relay: &str) -> Result<(), BridgeError> {
        self.get("open-door", &[("r", relay)]).await?;
        Ok(())
    }

    async fn restart(&self) -> Result<(), BridgeError> {
        self.get("restart", &[]).await?;
        Ok(())
    }

    async fn light_on(&self) -> Result<(), BridgeError> {
        self.get("light-on", &[]).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<u8>, BridgeError> {
        self.fetch_image().await
    }
}
