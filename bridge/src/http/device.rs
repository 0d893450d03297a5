//! Info and image endpoints

use crate::errors::BridgeError;
use crate::http::client::DeviceClient;
use crate::models::info::DeviceInfo;

impl DeviceClient {
    pub async fn fetch_info(&self) -> Result<DeviceInfo, BridgeError> {
        let doc: bha_models::InfoDocument = self.get_json("info", &[]).await?;
        DeviceInfo::try_from(doc)
    }

    /// Download the current JPEG image
    pub async fn fetch_image(&self) -> Result<Vec<u8>, BridgeError> {
        let response = self.get("image", &[]).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(BridgeError::MalformedResponse("empty image".to_string()));
        }
        Ok(bytes.to_vec())
    }
}
