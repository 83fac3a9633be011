use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::server::domain::error::BillError;
use crate::server::domain::establishment::Fees;
use crate::server::domain::member::{BillMemberId, CustomerId};
use crate::server::domain::money::{clamp_non_negative, round2};

pub type PaymentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum PaymentStatus {
    InAnalysis,
    Authorized,
    Cancelled,
    OfflinePending,
    OfflineApproved,
    OfflineCancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::InAnalysis => "IN_ANALYSIS",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::OfflinePending => "OFFLINE_PENDING",
            PaymentStatus::OfflineApproved => "OFFLINE_APPROVED",
            PaymentStatus::OfflineCancelled => "OFFLINE_CANCELLED",
        }
    }

    /// Blocks the member from paying again and reserves its platform fee
    pub fn is_committed(&self) -> bool {
        !self.is_cancelled()
    }

    /// Counts into the bill's paid value
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Authorized | PaymentStatus::OfflineApproved)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled | PaymentStatus::OfflineCancelled)
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_ANALYSIS" => Ok(Self::InAnalysis),
            "AUTHORIZED" => Ok(Self::Authorized),
            "CANCELLED" => Ok(Self::Cancelled),
            "OFFLINE_PENDING" => Ok(Self::OfflinePending),
            "OFFLINE_APPROVED" => Ok(Self::OfflineApproved),
            "OFFLINE_CANCELLED" => Ok(Self::OfflineCancelled),
            s => Err(format!("Invalid PaymentStatus: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum PaymentMethod {
    Online,
    Offline,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "ONLINE",
            PaymentMethod::Offline => "OFFLINE",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(Self::Online),
            "OFFLINE" => Ok(Self::Offline),
            s => Err(format!("Invalid PaymentMethod: {s}")),
        }
    }
}

/// Processing cost charged by the card gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GatewayRates {
    pub tax_rate: Decimal,
    pub fixed_fee: Decimal,
}

impl Default for GatewayRates {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(499, 4),
            fixed_fee: Decimal::new(69, 2),
        }
    }
}

/// How one online charge divides between the establishment and the platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FeeSplit {
    pub charged: Decimal,
    pub establishment_value: Decimal,
    pub platform_value: Decimal,
    pub gateway_fee: Decimal,
    /// who bears the processing cost at the gateway
    pub establishment_pays_fee: bool,
}

impl FeeSplit {
    pub fn compute(
        share: Decimal,
        noruh_fee: Decimal,
        promotion: Decimal,
        fees: &Fees,
        gateway: &GatewayRates,
    ) -> Self {
        let (mut establishment_value, platform_value) = if fees.pays_payment_tax
            && fees.payment_tax > gateway.tax_rate
        {
            let platform = noruh_fee + (fees.payment_tax - gateway.tax_rate) * share;
            (share + noruh_fee - platform, platform)
        } else {
            (share, noruh_fee)
        };
        establishment_value = clamp_non_negative(establishment_value - promotion);
        let charged = clamp_non_negative(share + noruh_fee - promotion);

        Self {
            charged: round2(charged),
            establishment_value: round2(establishment_value),
            platform_value: round2(platform_value),
            gateway_fee: round2(charged * gateway.tax_rate + gateway.fixed_fee),
            establishment_pays_fee: fees.pays_payment_tax,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BillPayment {
    pub id: Option<PaymentId>,
    pub payment_uuid: String,
    /// empty for the staff payment that closes the whole bill
    pub customer_id: Option<CustomerId>,
    pub bill_member_id: Option<BillMemberId>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// charged amount, platform fee included and promotion already taken off
    pub value: Decimal,
    pub noruh_fee: Decimal,
    pub gateway_fee: Decimal,
    pub establishment_value: Decimal,
    pub platform_value: Decimal,
    pub gateway_payment_id: Option<String>,
    pub promotion_id: Option<i64>,
    pub promotion_value: Decimal,
    pub date: DateTime<Utc>,
    pub status_updated: Option<DateTime<Utc>>,
}

impl BillPayment {
    /// value the payment contributes to consumption, platform fee excluded
    pub fn value_without_noruh_fee(&self) -> Decimal {
        self.value - self.noruh_fee
    }

    pub fn approve_offline(&mut self, now: DateTime<Utc>) -> Result<(), BillError> {
        self.transition(PaymentStatus::OfflinePending, PaymentStatus::OfflineApproved, now)
    }

    pub fn reject_offline(&mut self, now: DateTime<Utc>) -> Result<(), BillError> {
        self.transition(PaymentStatus::OfflinePending, PaymentStatus::OfflineCancelled, now)
    }

    /// Returns true when the status actually moved
    pub fn apply_gateway_status(
        &mut self,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, BillError> {
        match status {
            PaymentStatus::InAnalysis if self.status == PaymentStatus::InAnalysis => Ok(false),
            PaymentStatus::Authorized | PaymentStatus::Cancelled => {
                self.transition(PaymentStatus::InAnalysis, status, now)?;
                Ok(true)
            }
            other => Err(BillError::InvalidPaymentTransition {
                from: self.status.as_str(),
                to: other.as_str(),
            }),
        }
    }

    fn transition(
        &mut self,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        if self.status != from {
            return Err(BillError::InvalidPaymentTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.status_updated = Some(now);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn payment(status: PaymentStatus, value: Decimal, noruh_fee: Decimal) -> BillPayment {
        BillPayment {
            id: None,
            payment_uuid: uuid::Uuid::new_v4().to_string(),
            customer_id: Some(1),
            bill_member_id: None,
            method: PaymentMethod::Offline,
            status,
            value,
            noruh_fee,
            gateway_fee: Decimal::ZERO,
            establishment_value: value - noruh_fee,
            platform_value: noruh_fee,
            gateway_payment_id: None,
            promotion_id: None,
            promotion_value: Decimal::ZERO,
            date: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            status_updated: None,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(100, 0).unwrap()
    }

    #[test]
    fn status_classes() {
        assert!(PaymentStatus::InAnalysis.is_committed());
        assert!(PaymentStatus::OfflinePending.is_committed());
        assert!(!PaymentStatus::InAnalysis.is_settled());
        assert!(PaymentStatus::Authorized.is_settled());
        assert!(PaymentStatus::OfflineApproved.is_settled());
        assert!(!PaymentStatus::Cancelled.is_committed());
        assert!(!PaymentStatus::OfflineCancelled.is_committed());
    }

    #[test]
    fn offline_transitions() {
        let mut p = payment(PaymentStatus::OfflinePending, Decimal::TEN, Decimal::ZERO);
        p.approve_offline(now()).unwrap();
        assert_eq!(p.status, PaymentStatus::OfflineApproved);
        assert_eq!(p.status_updated, Some(now()));
        assert!(p.reject_offline(now()).is_err());
    }

    #[test]
    fn gateway_transitions() {
        let mut p = payment(PaymentStatus::InAnalysis, Decimal::TEN, Decimal::ZERO);
        assert!(!p.apply_gateway_status(PaymentStatus::InAnalysis, now()).unwrap());
        assert!(p.apply_gateway_status(PaymentStatus::Authorized, now()).unwrap());
        assert!(p.apply_gateway_status(PaymentStatus::Cancelled, now()).is_err());

        let mut offline = payment(PaymentStatus::OfflinePending, Decimal::TEN, Decimal::ZERO);
        assert!(offline.apply_gateway_status(PaymentStatus::Authorized, now()).is_err());
    }

    #[test]
    fn split_when_platform_bears_the_tax() {
        let fees = Fees { noruh_fee: Decimal::new(2, 0), ..Fees::default() };
        let split = FeeSplit::compute(
            Decimal::new(100, 0),
            Decimal::new(2, 0),
            Decimal::ZERO,
            &fees,
            &GatewayRates::default(),
        );
        assert_eq!(split.charged, Decimal::new(102, 0));
        assert_eq!(split.establishment_value, Decimal::new(100, 0));
        assert_eq!(split.platform_value, Decimal::new(2, 0));
        // 102 * 0.0499 + 0.69 = 5.7798
        assert_eq!(split.gateway_fee, Decimal::new(578, 2));
        assert!(!split.establishment_pays_fee);
    }

    #[test]
    fn split_when_establishment_pays_above_gateway_rate() {
        let fees = Fees {
            noruh_fee: Decimal::new(2, 0),
            pays_payment_tax: true,
            payment_tax: Decimal::new(549, 4),
            ..Fees::default()
        };
        let split = FeeSplit::compute(
            Decimal::new(100, 0),
            Decimal::new(2, 0),
            Decimal::new(10, 0),
            &fees,
            &GatewayRates::default(),
        );
        // platform keeps 2 + (0.0549 - 0.0499) * 100 = 2.50
        assert_eq!(split.platform_value, Decimal::new(250, 2));
        assert_eq!(split.charged, Decimal::new(92, 0));
        // 102 - 2.50 - 10
        assert_eq!(split.establishment_value, Decimal::new(8950, 2));
        assert!(split.establishment_pays_fee);
    }
}
