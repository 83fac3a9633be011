//! Money helpers, every amount is a `Decimal` with cents precision.

use rust_decimal::prelude::*;

use crate::server::domain::error::BillError;

const DECIMAL_PLACES: u32 = 2;

/// Round half-up to cents
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[inline]
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Amount in integer cents, the unit the gateway expects
pub fn to_cents(value: Decimal) -> Result<i64, BillError> {
    round2(value)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or(BillError::InvalidPaymentValue)
}
