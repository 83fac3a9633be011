use rust_decimal::Decimal;
use serde::Serialize;

use crate::server::domain::error::BillError;
use crate::server::domain::money::round2;

pub type EstablishmentId = i64;
pub type TableId = i64;
pub type MenuItemId = i64;

/// Fee settings an establishment charges on every bill
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fees {
    /// per-person cover charge
    pub couvert: Decimal,
    /// service tax rate applied over orders
    pub service_tax: Decimal,
    /// platform fee, charged once per paying member
    pub noruh_fee: Decimal,
    /// when set the establishment absorbs the card processing tax
    pub pays_payment_tax: bool,
    pub payment_tax: Decimal,
    /// share of offline payments owed back to the platform
    pub offline_percentage: Decimal,
    /// consumption step that unlocks a new offer
    pub offer_range_value: Decimal,
    pub offer_count_limit: i32,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            couvert: Decimal::ZERO,
            service_tax: Decimal::new(10, 2),
            noruh_fee: Decimal::ZERO,
            pays_payment_tax: false,
            payment_tax: Decimal::new(549, 4),
            offline_percentage: Decimal::new(2, 2),
            offer_range_value: Decimal::new(50, 0),
            offer_count_limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Establishment {
    pub id: EstablishmentId,
    pub name: String,
    pub enabled: bool,
    pub fees: Fees,
}

#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub id: TableId,
    pub establishment_id: EstablishmentId,
    pub name: String,
    pub enabled: bool,
    /// pseudo table for remote orders, may carry several open bills
    pub remote: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct MenuItem {
    pub id: MenuItemId,
    pub establishment_id: EstablishmentId,
    pub name: String,
    pub price: Decimal,
    pub available: bool,
    pub category_id: Option<i64>,
    pub offer_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct MenuOffer {
    pub id: i64,
    pub category_id: i64,
    /// fraction taken off the item price
    pub discount: Decimal,
}

impl MenuOffer {
    pub fn discounted_price(&self, item: &MenuItem) -> Decimal {
        round2(item.price - item.price * self.discount)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Promotion {
    pub id: i64,
    pub establishment_id: EstablishmentId,
    pub promocode: String,
    pub value: Decimal,
    pub enabled: bool,
}

impl Promotion {
    /// Promocodes an establishment switched off are known but refused
    pub fn ensure_enabled(&self) -> Result<(), BillError> {
        if !self.enabled {
            return Err(BillError::PromotionDisabled);
        }
        Ok(())
    }
}
