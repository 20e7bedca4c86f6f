pub mod errors;
mod models;

use std::time::Duration;
use reqwest::Client;
use serde_json::Value;
use crate::initialization::PrismConfig;
use crate::manager_prism::errors::PrismError;
pub use crate::manager_prism::models::EntityKind;
use crate::models::TimeWindow;
use crate::timeutil::unix_to_query;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the ADS PRISM telemetry API.
pub struct Prism {
    api_base: String,
    api_token: String,
    rain_location_id: u32,
    client: Client,
}

impl Prism {
    /// Returns a new instance of the Prism struct
    ///
    /// # Arguments
    ///
    /// * 'config' - PRISM configuration struct
    pub fn new(config: &PrismConfig) -> Result<Self, PrismError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_base: config.api_base.to_string(),
            api_token: config.api_token.to_string(),
            rain_location_id: config.rain_location_id,
            client,
        })
    }

    /// Rainfall at the gauge of record.
    pub async fn fetch_rain(&self, window: TimeWindow) -> Result<Value, PrismError> {
        self.fetch_telemetry(window, EntityKind::Rain, &[self.rain_location_id]).await
    }

    /// Issues one range query for one quantity at the given locations and
    /// returns the provider's nested response as-is. Different call sites
    /// slice different parts of it, so normalization stays with the caller.
    ///
    /// Single attempt by contract; failures propagate.
    ///
    /// # Arguments
    ///
    /// * 'window' - time window to cover
    /// * 'entity' - which quantity to query
    /// * 'location_ids' - provider location ids to include
    pub async fn fetch_telemetry(
        &self,
        window: TimeWindow,
        entity: EntityKind,
        location_ids: &[u32],
    ) -> Result<Value, PrismError> {
        let url = format!("{}/api/Telemetry", self.api_base);

        let mut query: Vec<(&str, String)> = location_ids
            .iter()
            .map(|id| ("locationId", id.to_string()))
            .collect();
        query.push(("entityId", entity.entity_id().to_string()));
        query.push(("start", unix_to_query(window.start_unix)));
        query.push(("end", unix_to_query(window.end_unix)));

        let resp = self.client.get(&url)
            .header("accept", "text/plain")
            .header("x-ads-dev", &self.api_token)
            .query(&query)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PrismError::Upstream(format!("{:?}", status)));
        }

        let json = resp.text().await?;
        let data: Value = serde_json::from_str(&json)?;

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_match_the_provider_catalog() {
        assert_eq!(EntityKind::Depth.entity_id(), 4122);
        assert_eq!(EntityKind::WaterTemp.entity_id(), 4405);
        assert_eq!(EntityKind::Rain.entity_id(), 2123);
    }
}
