//! HTTP client for the device's BHA API

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::errors::BridgeError;

/// Connection details for the device
#[derive(Debug, Clone)]
pub struct DeviceCredentials {
    /// Host or IP address of the device
    pub address: String,

    /// API user
    pub user: String,

    /// API password
    pub password: SecretString,
}

/// HTTP client for device communication
pub struct DeviceClient {
    client: Client,
    base_url: Url,
    credentials: DeviceCredentials,
}

impl DeviceClient {
    /// Create a new device client; every request is bounded by `timeout`
    pub fn new(credentials: DeviceCredentials, timeout: Duration) -> Result<Self, BridgeError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(&format!("http://{}/bha-api/", credentials.address))
            .map_err(|e| BridgeError::Config(format!("device address: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    /// Build `http://<address>/bha-api/<command>.cgi?http-user=..&http-password=..[&..]`
    pub(crate) fn command_url(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<Url, BridgeError> {
        let mut url = self
            .base_url
            .join(&format!("{}.cgi", command))
            .map_err(|e| BridgeError::Internal(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("http-user", &self.credentials.user);
            query.append_pair("http-password", self.credentials.password.expose_secret());
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET a command and require a 200 response
    pub(crate) async fn get(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<Response, BridgeError> {
        let url = self.command_url(command, params)?;
        debug!("GET {}.cgi", command);
        self.send(command, self.client.get(url)).await
    }

    /// GET a command and decode the JSON body
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<T, BridgeError> {
        let response = self.get(command, params).await?;
        decode(command, response).await
    }

    /// POST a JSON body to a command and require a 200 response
    pub(crate) async fn post_json<B: serde::Serialize>(
        &self,
        command: &str,
        body: &B,
    ) -> Result<Response, BridgeError> {
        let url = self.command_url(command, &[])?;
        debug!("POST {}.cgi", command);
        self.send(command, self.client.post(url).json(body)).await
    }

    async fn send(&self, command: &str, request: RequestBuilder) -> Result<Response, BridgeError> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::UNAUTHORIZED => Err(BridgeError::Unauthorized),
            status => {
                warn!("{}.cgi answered with {}", command, status);
                Err(BridgeError::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(command: &str, response: Response) -> Result<T, BridgeError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| BridgeError::MalformedResponse(format!("{}.cgi: {}", command, e)))
}
