//! Device info

use crate::errors::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub firmware: String,
    pub build: String,
    pub device_type: String,
    pub relays: Vec<String>,
}

impl TryFrom<bha_models::InfoDocument> for DeviceInfo {
    type Error = BridgeError;

    fn try_from(doc: bha_models::InfoDocument) -> Result<Self, Self::Error> {
        let version = doc
            .bha
            .version
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::MalformedResponse("info without VERSION".to_string()))?;
        Ok(Self {
            firmware: version.firmware.unwrap_or_default(),
            build: version.build_number.unwrap_or_default(),
            device_type: version.device_type.unwrap_or_default(),
            relays: version.relays,
        })
    }
}
