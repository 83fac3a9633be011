//! Card payment gateway client

use anyhow::{bail, Context, Error};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::server::domain::member::CustomerId;
use crate::server::domain::payment::PaymentStatus;

/// Amount goes out in integer cents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChargeRequest {
    pub reference: String,
    pub customer_id: CustomerId,
    pub amount: i64,
    pub card_token: String,
    /// part of the amount routed to the platform, in cents
    pub platform_amount: i64,
    pub establishment_pays_fee: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GatewayCharge {
    pub id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
    status: String,
}

/// Anything the gateway does not report as final is still under analysis
pub(crate) fn map_status(status: &str) -> PaymentStatus {
    match status.to_ascii_uppercase().as_str() {
        "AUTHORIZED" | "PAID" => PaymentStatus::Authorized,
        "CANCELLED" | "CANCELED" | "DECLINED" => PaymentStatus::Cancelled,
        _ => PaymentStatus::InAnalysis,
    }
}

#[async_trait]
pub(crate) trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, Error>;
    async fn status(&self, gateway_payment_id: &str) -> Result<PaymentStatus, Error>;
    /// Charge created for one of our payment uuids, if the gateway ever got it
    async fn find_by_reference(&self, reference: &str) -> Result<Option<GatewayCharge>, Error>;
}

pub(crate) struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Every call gives up after `timeout`
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build gateway client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, Error> {
        let res = self
            .client
            .post(format!("{}/v1/charges", self.base_url))
            .json(request)
            .send()
            .await
            .context("failed to reach payment gateway")?;
        match res.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body = res.json::<ChargeResponse>().await?;
                Ok(GatewayCharge {
                    status: map_status(&body.status),
                    id: body.id,
                })
            }
            unexpected => bail!("gateway refused charge {}: {}", request.reference, unexpected),
        }
    }

    async fn status(&self, gateway_payment_id: &str) -> Result<PaymentStatus, Error> {
        let res = self
            .client
            .get(format!("{}/v1/charges/{}", self.base_url, gateway_payment_id))
            .send()
            .await
            .context("failed to reach payment gateway")?;
        match res.status() {
            StatusCode::OK => Ok(map_status(&res.json::<ChargeResponse>().await?.status)),
            unexpected => bail!("gateway status lookup for {} failed: {}", gateway_payment_id, unexpected),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<GatewayCharge>, Error> {
        let res = self
            .client
            .get(format!("{}/v1/charges", self.base_url))
            .query(&[("reference", reference)])
            .send()
            .await
            .context("failed to reach payment gateway")?;
        match res.status() {
            StatusCode::OK => {
                let body = res.json::<ChargeResponse>().await?;
                Ok(Some(GatewayCharge {
                    status: map_status(&body.status),
                    id: body.id,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            unexpected => bail!("gateway lookup for reference {} failed: {}", reference, unexpected),
        }
    }
}
