use crate::model::GenericError;
use async_trait::async_trait;
use common::config::PaymentsConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Seam to the external payment processor. The storefront only ever
/// records the returned charge id; card data never touches this service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the given amount against a client-obtained token and
    /// return the processor's charge id.
    async fn charge(
        &self,
        amount: f64,
        currency: &str,
        token: &str,
    ) -> Result<String, GenericError>;
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    amount: f64,
    currency: &'a str,
    source: &'a str,
}

#[derive(Deserialize)]
struct ChargeResponse {
    id: String,
}

/// Gateway implementation over plain HTTP, configured from the
/// `payments` config section.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: PaymentsConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: PaymentsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(
        &self,
        amount: f64,
        currency: &str,
        token: &str,
    ) -> Result<String, GenericError> {
        debug!("Submitting charge of {} {} to gateway", amount, currency);

        let response = self
            .client
            .post(self.config.gateway_url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&ChargeRequest {
                amount,
                currency,
                source: token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            error!(status = %response.status(), "Gateway rejected charge");
            return Err(format!("payment gateway rejected charge: {}", response.status()).into());
        }

        let body: ChargeResponse = response.json().await?;
        info!("Gateway accepted charge: {}", body.id);
        Ok(body.id)
    }
}
