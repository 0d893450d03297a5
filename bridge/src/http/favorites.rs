//! Favorites endpoints

use bha_models::FavoritesListing;

use crate::errors::BridgeError;
use crate::http::client::DeviceClient;
use crate::models::favorite::{FavoriteId, RemoteFavorite};

impl DeviceClient {
    /// List the HTTP favorites
    pub async fn fetch_favorites(&self) -> Result<Vec<RemoteFavorite>, BridgeError> {
        let listing: FavoritesListing = self.get_json("favorites", &[]).await?;
        Ok(listing.http.into_iter().map(RemoteFavorite::from).collect())
    }

    /// Create (`id == None`) or overwrite an HTTP favorite
    pub async fn save_favorite(
        &self,
        id: Option<&FavoriteId>,
        title: &str,
        target_url: &str,
    ) -> Result<(), BridgeError> {
        let mut params = vec![("action", "save"), ("type", "http")];
        if let Some(id) = id {
            params.push(("id", id.as_str()));
        }
        params.push(("title", title));
        params.push(("value", target_url));
        self.get("favorites", &params).await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, id: &FavoriteId) -> Result<(), BridgeError> {
        self.get(
            "favorites",
            &[("action", "remove"), ("type", "http"), ("id", id.as_str())],
        )
        .await?;
        Ok(())
    }
}
