//! Client for the external truck market.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | list offers | `GET /trucks` | `[{"name", "price", "quantity", "operatingCost", "maxLoad"}]` |
//! | place order | `POST /trucks/purchase {"truckName", "quantity"}` | `{"orderId", "bankAccount", "price", "quantity"}` |
//!
//! The `price` of an order is the total due for the whole order.

use haulsim_types::{MarketOrder, TruckOffer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::http::{self, HttpClientConfig};

/// Service name used in errors and logs.
const SERVICE: &str = "market";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferResponse {
    name: String,
    price: Decimal,
    quantity: u32,
    operating_cost: Decimal,
    max_load: u32,
}

impl From<OfferResponse> for TruckOffer {
    fn from(offer: OfferResponse) -> Self {
        Self {
            name: offer.name,
            unit_price: offer.price,
            daily_operating_cost: offer.operating_cost,
            max_load: offer.max_load,
            quantity_available: offer.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    truck_name: &'a str,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: serde_json::Value,
    bank_account: String,
    price: Decimal,
    quantity: u32,
}

/// HTTP client for the truck market.
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl MarketClient {
    /// Create a market client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the HTTP client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: config.build_client()?,
            config,
        })
    }

    /// List the truck variants currently for sale.
    pub async fn list_offers(&self) -> Result<Vec<TruckOffer>, ClientError> {
        let request = self.client.get(self.config.url("/trucks"));
        let offers: Vec<OfferResponse> = http::send_json(request, SERVICE).await?;
        Ok(offers.into_iter().map(TruckOffer::from).collect())
    }

    /// Order `quantity` trucks of variant `name`.
    pub async fn place_order(&self, name: &str, quantity: u32) -> Result<MarketOrder, ClientError> {
        let request = self
            .client
            .post(self.config.url("/trucks/purchase"))
            .json(&OrderRequest {
                truck_name: name,
                quantity,
            });
        let response: OrderResponse = http::send_json(request, SERVICE).await?;
        Ok(order_from_response(response))
    }
}

/// Order ids arrive as either JSON strings or numbers.
fn order_from_response(response: OrderResponse) -> MarketOrder {
    let order_id = match response.order_id {
        serde_json::Value::String(id) => id,
        other => other.to_string(),
    };
    MarketOrder {
        order_id,
        bank_account: response.bank_account,
        total_price: response.price,
        quantity: response.quantity,
    }
}
