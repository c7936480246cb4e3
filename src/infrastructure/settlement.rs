use crate::config::PaymentConfig;
use crate::domain::order::Amount;
use crate::domain::ports::SettlementGateway;
use crate::domain::settlement::{PaymentReceipt, SettlementStatus, StatusCheck};
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Selects the gateway from configuration: live HTTP when an endpoint is
/// configured, deterministic simulation otherwise.
pub fn gateway_from_config(config: &PaymentConfig) -> Arc<dyn SettlementGateway> {
    match &config.endpoint {
        Some(endpoint) => Arc::new(HttpGateway::new(
            endpoint.clone(),
            config.api_key.clone(),
            config.network.clone(),
        )),
        None => Arc::new(SimulatedGateway::new()),
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic, no-network gateway used for development and testing.
///
/// Transaction ids are a pure function of `(order_id, amount, contact)`, so
/// repeated requests with identical inputs are reproducible. A transaction
/// id ending in an even hex digit confirms with 6 confirmations and a
/// derived hash; every other id stays pending with 0 confirmations.
#[derive(Debug, Default)]
pub struct SimulatedGateway;

impl SimulatedGateway {
    pub const NETWORK: &'static str = "simnet";

    pub fn new() -> Self {
        Self
    }

    fn tx_id(order_id: &str, amount: Amount, contact: Option<&str>) -> String {
        let seed = format!("{}:{}:{}", order_id, amount, contact.unwrap_or_default());
        format!("sim_{}", &sha256_hex(&seed)[..16])
    }

    fn confirms(tx_id: &str) -> bool {
        tx_id
            .chars()
            .last()
            .and_then(|c| c.to_digit(16))
            .is_some_and(|digit| digit % 2 == 0)
    }

    fn status_of(tx_id: &str, refreshed: bool) -> StatusCheck {
        if Self::confirms(tx_id) {
            StatusCheck {
                tx_id: tx_id.to_string(),
                status: SettlementStatus::Confirmed,
                confirmations: 6,
                tx_hash: Some(format!("0x{}", sha256_hex(tx_id))),
                simulation_mode: true,
                refreshed,
            }
        } else {
            StatusCheck {
                tx_id: tx_id.to_string(),
                status: SettlementStatus::Pending,
                confirmations: 0,
                tx_hash: None,
                simulation_mode: true,
                refreshed,
            }
        }
    }
}

#[async_trait]
impl SettlementGateway for SimulatedGateway {
    async fn request_payment(
        &self,
        order_id: &str,
        amount: Amount,
        contact: Option<&str>,
    ) -> Result<PaymentReceipt> {
        let tx_id = Self::tx_id(order_id, amount, contact);
        Ok(PaymentReceipt {
            request_uri: format!("settle://pay/{tx_id}?amount={amount}"),
            tx_id,
            network: Self::NETWORK.to_string(),
            simulation_mode: true,
        })
    }

    async fn check_status(&self, tx_id: &str) -> Result<StatusCheck> {
        Ok(Self::status_of(tx_id, false))
    }

    async fn force_refresh(&self, tx_id: &str, _order_id: Option<&str>) -> Result<StatusCheck> {
        Ok(Self::status_of(tx_id, true))
    }
}

#[derive(Serialize)]
struct PaymentRequestBody<'a> {
    order_id: &'a str,
    amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<&'a str>,
}

#[derive(Deserialize)]
struct PaymentRequestWire {
    request_uri: String,
    tx_id: String,
    network: String,
}

#[derive(Deserialize)]
struct StatusWire {
    status: SettlementStatus,
    #[serde(default)]
    confirmations: u32,
    #[serde(default)]
    tx_hash: Option<String>,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<&'a str>,
}

/// Live gateway against the settlement provider's HTTP API.
///
/// No retries here; errors surface as [`ProviderError`] so callers can
/// classify them (auth escalation, keep polling, abort).
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    network: String,
}

impl HttpGateway {
    pub fn new(base_url: String, api_key: Option<String>, network: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            network,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| ProviderError::transport(err.to_string(), endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(status.as_u16(), message, endpoint).into());
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ProviderError::transport(err.to_string(), endpoint).into())
    }
}

#[async_trait]
impl SettlementGateway for HttpGateway {
    async fn request_payment(
        &self,
        order_id: &str,
        amount: Amount,
        contact: Option<&str>,
    ) -> Result<PaymentReceipt> {
        let endpoint = format!("{}/payments", self.base_url);
        let wire: PaymentRequestWire = self
            .send(
                self.client.post(&endpoint).json(&PaymentRequestBody {
                    order_id,
                    amount,
                    contact,
                }),
                &endpoint,
            )
            .await?;
        Ok(PaymentReceipt {
            request_uri: wire.request_uri,
            tx_id: wire.tx_id,
            network: wire.network,
            simulation_mode: false,
        })
    }

    async fn check_status(&self, tx_id: &str) -> Result<StatusCheck> {
        let endpoint = format!("{}/payments/{tx_id}", self.base_url);
        let wire: StatusWire = self.send(self.client.get(&endpoint), &endpoint).await?;
        Ok(StatusCheck {
            tx_id: tx_id.to_string(),
            status: wire.status,
            confirmations: wire.confirmations,
            tx_hash: wire.tx_hash,
            simulation_mode: false,
            refreshed: false,
        })
    }

    async fn force_refresh(&self, tx_id: &str, order_id: Option<&str>) -> Result<StatusCheck> {
        let endpoint = format!("{}/payments/{tx_id}/refresh", self.base_url);
        let wire: StatusWire = self
            .send(
                self.client.post(&endpoint).json(&RefreshBody { order_id }),
                &endpoint,
            )
            .await?;
        Ok(StatusCheck {
            tx_id: tx_id.to_string(),
            status: wire.status,
            confirmations: wire.confirmations,
            tx_hash: wire.tx_hash,
            simulation_mode: false,
            refreshed: true,
        })
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
