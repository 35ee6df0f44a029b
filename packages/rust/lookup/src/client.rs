//! HTTP client for the four item enrichment endpoints.
//!
//! The aggregation contract: the primary item lookup is a hard prerequisite
//! (its response carries the keys the other lookups need). The three
//! dependent lookups then run concurrently and are joined before the merged
//! record is assembled. A failure anywhere yields a fetch error naming the
//! endpoint — never a partially filled record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use marketfeed_shared::{EndpointConfig, ItemRecord, LookupEndpoint, MarketFeedError, Result};

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("marketfeed/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Endpoint response bodies
// ---------------------------------------------------------------------------

/// Body of the primary item lookup.
#[derive(Debug, Deserialize)]
struct ItemResponse {
    price: f64,
    date_created: DateTime<Utc>,
    category_id: String,
    currency_id: String,
    seller_id: u64,
}

/// Body of the seller lookup.
#[derive(Debug, Deserialize)]
struct SellerResponse {
    nickname: String,
}

/// Body of the category lookup.
#[derive(Debug, Deserialize)]
struct CategoryResponse {
    name: String,
}

/// Body of the currency lookup.
#[derive(Debug, Deserialize)]
struct CurrencyResponse {
    description: String,
}

// ---------------------------------------------------------------------------
// ItemLookup
// ---------------------------------------------------------------------------

/// Aggregates the four remote lookups for one identifier into a record.
pub struct ItemLookup {
    client: Client,
    endpoints: EndpointConfig,
}

impl ItemLookup {
    /// Create a lookup client against the given endpoint bases.
    pub fn new(endpoints: EndpointConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                MarketFeedError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, endpoints })
    }

    /// Fetch and merge the full record for `item_id`.
    ///
    /// The primary lookup runs first; on failure the dependent lookups are
    /// never started. The three dependent lookups run concurrently and are
    /// all awaited before any failure is reported, so a slow sibling is
    /// never cancelled mid-flight by a fast failure.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn fetch_record(&self, item_id: &str) -> Result<ItemRecord> {
        let item = self
            .get_json::<ItemResponse>(LookupEndpoint::Item, &self.endpoints.items, item_id)
            .await?;

        let seller_id = item.seller_id.to_string();
        let (seller, category, currency) = tokio::join!(
            self.get_json::<SellerResponse>(
                LookupEndpoint::Seller,
                &self.endpoints.sellers,
                &seller_id,
            ),
            self.get_json::<CategoryResponse>(
                LookupEndpoint::Category,
                &self.endpoints.categories,
                &item.category_id,
            ),
            self.get_json::<CurrencyResponse>(
                LookupEndpoint::Currency,
                &self.endpoints.currencies,
                &item.currency_id,
            ),
        );

        let seller = seller?;
        let category = category?;
        let currency = currency?;

        Ok(ItemRecord {
            price: item.price,
            created_at: item.date_created,
            category_id: item.category_id,
            currency_id: item.currency_id,
            seller_id: item.seller_id,
            category_name: category.name,
            currency_description: currency.description,
            seller_nickname: seller.nickname,
        })
    }

    /// GET `base + id` and decode a JSON body, classifying any failure
    /// against the named endpoint.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: LookupEndpoint,
        base: &str,
        id: &str,
    ) -> Result<T> {
        let url = format!("{base}{id}");
        debug!(endpoint = %endpoint, %url, "remote lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketFeedError::fetch(endpoint, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketFeedError::fetch(
                endpoint,
                format!("{url}: HTTP {status}"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MarketFeedError::fetch(endpoint, format!("{url}: decode failed: {e}")))
    }
}
