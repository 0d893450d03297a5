//! Schedule endpoints

use crate::errors::BridgeError;
use crate::http::client::DeviceClient;
use crate::models::schedule::ScheduleEntry;

impl DeviceClient {
    /// List and type-check all schedule entries
    pub async fn fetch_schedule(&self) -> Result<Vec<ScheduleEntry>, BridgeError> {
        let raw: Vec<bha_models::ScheduleEntry> = self.get_json("schedule", &[]).await?;
        raw.into_iter().map(ScheduleEntry::try_from).collect()
    }

    /// Replace one entry; the device has no append primitive
    pub async fn submit_schedule(&self, entry: &ScheduleEntry) -> Result<(), BridgeError> {
        let body = bha_models::ScheduleEntry::from(entry);
        self.post_json("schedule", &body).await?;
        Ok(())
    }
}
