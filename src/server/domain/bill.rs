//! A table's running tab and the rules for splitting and settling it.
//!
//! `Bill` is loaded as a whole (members, orders, payments) under a row lock,
//! mutated here, then written back. Every method either succeeds and leaves
//! the aggregate consistent, or fails without touching it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::server::domain::error::BillError;
use crate::server::domain::establishment::{
    Establishment, EstablishmentId, Fees, MenuItem, MenuOffer, Promotion, Table, TableId,
};
use crate::server::domain::member::{BillMember, BillMemberId, CustomerId};
use crate::server::domain::money::{clamp_non_negative, round2};
use crate::server::domain::order::{Order, OrderId};
use crate::server::domain::payment::{
    BillPayment, FeeSplit, GatewayRates, PaymentMethod, PaymentStatus,
};
use crate::server::notify::Notification;

pub type BillId = i64;

#[derive(Debug, Clone)]
pub(crate) struct Bill {
    pub id: Option<BillId>,
    pub establishment_id: EstablishmentId,
    pub table_id: TableId,
    pub fees: Fees,
    pub opening_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub value_paid: Decimal,
    pub offers_made_count: i32,
    pub offers_used_count: i32,
    pub last_offer_used: Decimal,
    pub members: Vec<BillMember>,
    pub orders: Vec<Order>,
    pub payments: Vec<BillPayment>,
    /// persisted join requests that were declined or withdrawn
    pub removed_members: Vec<BillMemberId>,
    events: Vec<Notification>,
}

/// What one member owes for their own consumption
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Consumption {
    pub orders: Decimal,
    pub couvert: Decimal,
    pub service_tax: Decimal,
    pub noruh_fee: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub(crate) struct PaymentRequest {
    pub payment_uuid: String,
    pub customer_id: CustomerId,
    /// share of consumption the member pays, platform fee excluded
    pub value: Decimal,
    pub noruh_fee: Option<Decimal>,
    pub promotion: Option<Promotion>,
}

impl PaymentRequest {
    fn fee(&self) -> Decimal {
        self.noruh_fee.unwrap_or(Decimal::ZERO)
    }

    fn promotion_value(&self) -> Decimal {
        self.promotion.as_ref().map(|p| p.value).unwrap_or(Decimal::ZERO)
    }
}

/// Line on an order request
#[derive(Debug, Clone)]
pub(crate) struct OrderLine {
    pub item: MenuItem,
    pub quantity: i32,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Settlement {
    pub bill_closed: bool,
}

impl Bill {
    /// Open a tab on a table, the opener becomes its owner.
    ///
    /// `owner_seated` tells whether the customer already holds an active
    /// membership anywhere, `table_busy` whether the table has an open bill.
    pub fn open(
        establishment: &Establishment,
        table: &Table,
        owner: CustomerId,
        owner_seated: bool,
        table_busy: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, BillError> {
        if !establishment.enabled {
            return Err(BillError::EstablishmentDisabled);
        }
        if owner_seated {
            return Err(BillError::OpenBillExists);
        }
        if table.establishment_id != establishment.id || !table.enabled {
            return Err(BillError::TableNotFound);
        }
        if table_busy && !table.remote {
            return Err(BillError::TableNotAvailable);
        }
        let fees = establishment.fees.clone();
        let mut bill = Self {
            id: None,
            establishment_id: establishment.id,
            table_id: table.id,
            opening_date: now,
            payment_date: None,
            value_paid: Decimal::ZERO,
            offers_made_count: 0,
            offers_used_count: 0,
            last_offer_used: Decimal::ZERO,
            members: vec![BillMember::owner(owner, fees.couvert, now)],
            orders: vec![],
            payments: vec![],
            removed_members: vec![],
            events: vec![],
            fees,
        };
        bill.events.push(Notification::BillOpened { table_id: table.id });
        Ok(bill)
    }

    /// Rebuild a persisted bill
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: BillId,
        establishment_id: EstablishmentId,
        table_id: TableId,
        fees: Fees,
        opening_date: DateTime<Utc>,
        payment_date: Option<DateTime<Utc>>,
        value_paid: Decimal,
        offers: (i32, i32, Decimal),
        members: Vec<BillMember>,
        orders: Vec<Order>,
        payments: Vec<BillPayment>,
    ) -> Self {
        let (offers_made_count, offers_used_count, last_offer_used) = offers;
        Self {
            id: Some(id),
            establishment_id,
            table_id,
            fees,
            opening_date,
            payment_date,
            value_paid,
            offers_made_count,
            offers_used_count,
            last_offer_used,
            members,
            orders,
            payments,
            removed_members: vec![],
            events: vec![],
        }
    }

    pub fn take_events(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, event: Notification) {
        self.events.push(event);
    }

    pub fn is_open(&self) -> bool {
        self.payment_date.is_none()
    }

    fn ensure_open(&self) -> Result<(), BillError> {
        if !self.is_open() {
            return Err(BillError::BillClosed);
        }
        Ok(())
    }

    // ----- accounting -----

    fn live_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.counts_toward_bill())
    }

    fn committed_payments(&self) -> impl Iterator<Item = &BillPayment> {
        self.payments.iter().filter(|p| p.status.is_committed())
    }

    fn settled_payments(&self) -> impl Iterator<Item = &BillPayment> {
        self.payments.iter().filter(|p| p.status.is_settled())
    }

    pub fn orders_total(&self) -> Decimal {
        self.live_orders().map(Order::total_price).sum()
    }

    /// First membership of every customer that ever sat at the table.
    /// A customer who left and came back is charged once.
    fn joined_customers(&self) -> impl Iterator<Item = &BillMember> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .filter(move |m| m.has_joined() && seen.insert(m.customer_id))
    }

    /// Customers that ever sat at the table, gone ones included
    pub fn number_of_customers(&self) -> usize {
        self.joined_customers().count()
    }

    pub fn couvert_for_all(&self) -> Decimal {
        self.joined_customers().map(|m| m.couvert_value).sum()
    }

    pub fn service_tax(&self) -> Decimal {
        self.orders_total() * self.fees.service_tax
    }

    pub fn noruh_fee_for_all(&self) -> Decimal {
        self.fees.noruh_fee * Decimal::from(self.number_of_customers())
    }

    /// Everything the table owes: orders, couvert, service tax and platform fees
    pub fn all_value(&self) -> Decimal {
        round2(
            self.orders_total() + self.couvert_for_all() + self.service_tax() + self.noruh_fee_for_all(),
        )
    }

    pub fn value_without_service_tax(&self) -> Decimal {
        self.orders_total() + self.couvert_for_all()
    }

    pub fn still_to_pay(&self) -> Decimal {
        clamp_non_negative(self.all_value() - self.value_paid)
    }

    /// Payments waiting for a waiter or the gateway, reserved against the remainder
    pub fn value_in_flight(&self) -> Decimal {
        self.committed_payments()
            .filter(|p| !p.status.is_settled())
            .map(|p| p.value)
            .sum()
    }

    pub fn value_paid_without_noruh_fee(&self) -> Decimal {
        self.committed_payments()
            .map(BillPayment::value_without_noruh_fee)
            .sum()
    }

    /// How many platform fees the committed payments already cover
    pub fn noruh_fee_count(&self) -> Decimal {
        if self.fees.noruh_fee.is_zero() {
            return Decimal::ZERO;
        }
        let paid: Decimal = self.committed_payments().map(|p| p.noruh_fee).sum();
        paid / self.fees.noruh_fee
    }

    pub fn member_consumption(&self, customer_id: CustomerId) -> Result<Consumption, BillError> {
        let member = self
            .members
            .iter()
            .rev()
            .find(|m| m.customer_id == customer_id && m.has_joined())
            .ok_or(BillError::NotBillMember)?;
        let orders: Decimal = self
            .live_orders()
            .filter(|o| o.customer_id == customer_id)
            .map(Order::total_price)
            .sum();
        let service_tax = orders * self.fees.service_tax;
        let couvert = member.couvert_value;
        let noruh_fee = self.fees.noruh_fee;
        Ok(Consumption {
            orders,
            couvert,
            service_tax: round2(service_tax),
            noruh_fee,
            total: round2(orders + couvert + service_tax + noruh_fee),
        })
    }

    /// The flagged owner while seated, otherwise whoever joined first and is still here
    pub fn owner(&self) -> Option<&BillMember> {
        self.members
            .iter()
            .find(|m| m.bill_owner && m.is_seated())
            .or_else(|| {
                self.members
                    .iter()
                    .filter(|m| m.is_seated())
                    .min_by_key(|m| m.joined_at)
            })
    }

    fn ensure_owner(&self, customer_id: CustomerId) -> Result<(), BillError> {
        match self.owner() {
            Some(owner) if owner.customer_id == customer_id => Ok(()),
            _ => Err(BillError::NotBillOwner),
        }
    }

    fn seated_member(&self, customer_id: CustomerId) -> Option<&BillMember> {
        self.members
            .iter()
            .find(|m| m.customer_id == customer_id && m.is_seated())
    }

    fn active_seated_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_seated()).count()
    }

    // ----- membership -----

    pub fn request_join(
        &mut self,
        customer_id: CustomerId,
        seated_elsewhere: bool,
    ) -> Result<(), BillError> {
        self.ensure_open()?;
        if seated_elsewhere
            || self
                .members
                .iter()
                .any(|m| m.customer_id == customer_id && m.is_active())
        {
            return Err(BillError::OpenBillExists);
        }
        self.members
            .push(BillMember::request(customer_id, self.fees.couvert));
        let owner_id = self.owner().map(|m| m.customer_id);
        self.events.push(Notification::JoinRequested { customer_id, owner_id });
        Ok(())
    }

    pub fn answer_join(
        &mut self,
        owner: CustomerId,
        customer_id: CustomerId,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        self.ensure_open()?;
        self.ensure_owner(owner)?;
        let idx = self.pending_request(customer_id)?;
        if accept {
            self.members[idx].accept(now);
        } else {
            self.remove_member(idx);
        }
        self.events.push(Notification::JoinAnswered { customer_id, accepted: accept });
        Ok(())
    }

    /// Returns how many requests were accepted
    pub fn accept_all(&mut self, owner: CustomerId, now: DateTime<Utc>) -> Result<usize, BillError> {
        self.ensure_open()?;
        self.ensure_owner(owner)?;
        let mut accepted = vec![];
        for member in self.members.iter_mut().filter(|m| m.is_pending()) {
            member.accept(now);
            accepted.push(member.customer_id);
        }
        for customer_id in accepted.iter() {
            self.events.push(Notification::JoinAnswered {
                customer_id: *customer_id,
                accepted: true,
            });
        }
        Ok(accepted.len())
    }

    pub fn cancel_join(&mut self, customer_id: CustomerId) -> Result<(), BillError> {
        let idx = self.pending_request(customer_id)?;
        self.remove_member(idx);
        Ok(())
    }

    /// Walk away without paying, only while nothing live was ordered.
    /// The last seated member leaving closes the tab.
    pub fn leave_without_payment(
        &mut self,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        self.ensure_open()?;
        let idx = self
            .members
            .iter()
            .position(|m| m.customer_id == customer_id && m.is_seated())
            .ok_or(BillError::NotBillMember)?;
        if self.live_orders().next().is_some() {
            return Err(BillError::CannotLeaveBill);
        }
        self.members[idx].leave(now);
        self.events.push(Notification::MemberLeft { customer_id });
        if self.active_seated_count() == 0 {
            self.close(now);
        }
        Ok(())
    }

    fn pending_request(&self, customer_id: CustomerId) -> Result<usize, BillError> {
        self.members
            .iter()
            .position(|m| m.customer_id == customer_id && m.is_pending())
            .ok_or(BillError::JoinRequestNotFound)
    }

    fn remove_member(&mut self, idx: usize) {
        let member = self.members.remove(idx);
        if let Some(id) = member.id {
            self.removed_members.push(id);
        }
    }

    // ----- orders -----

    fn check_item(&self, item: &MenuItem) -> Result<(), BillError> {
        if item.establishment_id != self.establishment_id {
            return Err(BillError::ItemNotInEstablishment);
        }
        if !item.available {
            return Err(BillError::ItemUnavailable);
        }
        Ok(())
    }

    /// Place a batch of orders, all or nothing.
    /// Returns the offers unlocked by the new consumption.
    pub fn place_orders(
        &mut self,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, BillError> {
        self.ensure_open()?;
        if self.seated_member(customer_id).is_none() {
            return Err(BillError::NotBillMember);
        }
        let mut placed = Vec::with_capacity(lines.len());
        for line in lines.iter() {
            self.check_item(&line.item)?;
            placed.push(Order::new(
                customer_id,
                &line.item,
                line.quantity,
                line.observation.clone(),
                now,
            )?);
        }

        let mut unlocked = vec![];
        for (order, line) in placed.into_iter().zip(lines.iter()) {
            self.events.push(Notification::NewOrder {
                customer_id,
                item_name: order.item_name.clone(),
                quantity: order.quantity,
            });
            self.orders.push(order);
            if let Some(offer_id) = line.item.offer_id {
                if self.try_unlock_offer() {
                    unlocked.push(offer_id);
                    self.events.push(Notification::OfferUnlocked { offer_id });
                }
            }
        }
        Ok(unlocked)
    }

    /// Each `offer_range_value` of consumption earns one offer, up to the limit
    fn try_unlock_offer(&mut self) -> bool {
        let range = self.fees.offer_range_value;
        if range <= Decimal::ZERO || self.offers_made_count >= self.fees.offer_count_limit {
            return false;
        }
        let consumed = self.orders_total();
        if consumed - range < self.last_offer_used {
            return false;
        }
        self.last_offer_used = (consumed / range).floor() * range;
        self.offers_made_count += 1;
        true
    }

    pub fn place_offer_order(
        &mut self,
        customer_id: CustomerId,
        item: &MenuItem,
        offer: &MenuOffer,
        observation: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        self.ensure_open()?;
        if self.seated_member(customer_id).is_none() {
            return Err(BillError::NotBillMember);
        }
        if self.offers_used_count >= self.offers_made_count {
            return Err(BillError::OfferLimitReached);
        }
        if item.category_id != Some(offer.category_id) {
            return Err(BillError::ItemNotInOfferCategory);
        }
        self.check_item(item)?;
        let order = Order::with_offer(customer_id, item, offer.discounted_price(item), observation, now);
        self.events.push(Notification::NewOrder {
            customer_id,
            item_name: order.item_name.clone(),
            quantity: order.quantity,
        });
        self.orders.push(order);
        self.offers_used_count += 1;
        Ok(())
    }

    fn order_mut(&mut self, order_id: OrderId) -> Result<&mut Order, BillError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == Some(order_id))
            .ok_or(BillError::OrderNotFound)
    }

    pub fn accept_order(&mut self, order_id: OrderId, now: DateTime<Utc>) -> Result<(), BillError> {
        self.order_mut(order_id)?.accept(now)?;
        self.events.push(Notification::OrderAccepted { order_id: Some(order_id) });
        Ok(())
    }

    pub fn finish_order(&mut self, order_id: OrderId, now: DateTime<Utc>) -> Result<(), BillError> {
        self.order_mut(order_id)?.finish(now)?;
        self.events.push(Notification::OrderReady { order_id: Some(order_id) });
        Ok(())
    }

    /// Staff side refusal, changes what the table owes so the bill must be open
    pub fn reject_order(&mut self, order_id: OrderId, now: DateTime<Utc>) -> Result<(), BillError> {
        self.ensure_open()?;
        self.order_mut(order_id)?.reject(now)?;
        self.events.push(Notification::OrderRefused { order_id: Some(order_id) });
        Ok(())
    }

    pub fn cancel_order(
        &mut self,
        customer_id: CustomerId,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        self.ensure_open()?;
        self.order_mut(order_id)?.cancel_by_customer(customer_id, now)?;
        self.events.push(Notification::OrderCancelled { order_id: Some(order_id) });
        Ok(())
    }

    // ----- payments -----

    /// Checks a member's payment against what the bill still owes.
    /// `uuid_taken` reports a clash with payments on other bills.
    pub fn validate_payment(&self, request: &PaymentRequest, uuid_taken: bool) -> Result<(), BillError> {
        self.ensure_open()?;
        let fee = request.fee();
        if request.value < Decimal::ZERO || fee < Decimal::ZERO || request.value + fee <= Decimal::ZERO {
            return Err(BillError::InvalidPaymentValue);
        }
        if uuid_taken || self.payments.iter().any(|p| p.payment_uuid == request.payment_uuid) {
            return Err(BillError::DuplicatePayment);
        }
        if self.seated_member(request.customer_id).is_none() {
            return Err(BillError::NotBillMember);
        }
        if self
            .committed_payments()
            .any(|p| p.customer_id == Some(request.customer_id))
        {
            return Err(BillError::AlreadyPaid);
        }
        if fee > Decimal::ZERO {
            if self.fees.noruh_fee.is_zero() || fee != self.fees.noruh_fee {
                return Err(BillError::InvalidPlatformFee);
            }
            if self.noruh_fee_count() + Decimal::ONE > Decimal::from(self.number_of_customers()) {
                return Err(BillError::FeeLimitReached);
            }
        }
        if self.active_seated_count() == 1
            && request.value < self.value_without_service_tax() - self.value_paid_without_noruh_fee()
        {
            return Err(BillError::MustPayWholeBill);
        }
        if request.value + fee > self.all_value() - self.value_paid - self.value_in_flight() {
            return Err(BillError::ExceedsRemaining);
        }
        if let Some(promotion) = request.promotion.as_ref() {
            if promotion.establishment_id != self.establishment_id || !promotion.enabled {
                return Err(BillError::PromotionNotFound);
            }
            if self
                .settled_payments()
                .any(|p| p.promotion_id == Some(promotion.id))
            {
                return Err(BillError::PromotionAlreadyUsed);
            }
        }
        Ok(())
    }

    fn new_payment(
        &self,
        request: &PaymentRequest,
        method: PaymentMethod,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> BillPayment {
        let bill_member_id = self.seated_member(request.customer_id).and_then(|m| m.id);
        let fee = request.fee();
        let value = clamp_non_negative(request.value + fee - request.promotion_value());
        BillPayment {
            id: None,
            payment_uuid: request.payment_uuid.clone(),
            customer_id: Some(request.customer_id),
            bill_member_id,
            method,
            status,
            value,
            noruh_fee: fee,
            gateway_fee: Decimal::ZERO,
            establishment_value: clamp_non_negative(value - fee),
            platform_value: fee,
            gateway_payment_id: None,
            promotion_id: request.promotion.as_ref().map(|p| p.id),
            promotion_value: request.promotion_value(),
            date: now,
            status_updated: Some(now),
        }
    }

    /// Member declares a cash/card-machine payment, a waiter has to approve it
    pub fn record_offline_payment(
        &mut self,
        request: &PaymentRequest,
        uuid_taken: bool,
        now: DateTime<Utc>,
    ) -> Result<&BillPayment, BillError> {
        self.validate_payment(request, uuid_taken)?;
        let payment = self.new_payment(request, PaymentMethod::Offline, PaymentStatus::OfflinePending, now);
        self.events.push(Notification::PaymentCreated {
            payment_uuid: payment.payment_uuid.clone(),
            customer_id: payment.customer_id,
            value: payment.value,
        });
        self.payments.push(payment);
        Ok(&self.payments[self.payments.len() - 1])
    }

    /// Validates an online payment and stores it in analysis before the card
    /// is charged, so the charge can always be traced back to the bill.
    /// Returns the split to send to the gateway.
    pub fn begin_online_payment(
        &mut self,
        request: &PaymentRequest,
        uuid_taken: bool,
        gateway: &GatewayRates,
        now: DateTime<Utc>,
    ) -> Result<FeeSplit, BillError> {
        self.validate_payment(request, uuid_taken)?;
        let split = FeeSplit::compute(
            request.value,
            request.fee(),
            request.promotion_value(),
            &self.fees,
            gateway,
        );
        let mut payment = self.new_payment(request, PaymentMethod::Online, PaymentStatus::InAnalysis, now);
        payment.value = split.charged;
        payment.establishment_value = split.establishment_value;
        payment.platform_value = split.platform_value;
        payment.gateway_fee = split.gateway_fee;
        self.events.push(Notification::PaymentCreated {
            payment_uuid: payment.payment_uuid.clone(),
            customer_id: payment.customer_id,
            value: payment.value,
        });
        self.payments.push(payment);
        Ok(split)
    }

    /// Links the gateway's charge to a payment started by `begin_online_payment`
    /// and applies its status. The poller may have resolved it first.
    pub fn attach_gateway_charge(
        &mut self,
        payment_uuid: &str,
        gateway_payment_id: String,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Settlement, BillError> {
        let idx = self.payment_idx(payment_uuid)?;
        let payment = &mut self.payments[idx];
        if payment.gateway_payment_id.is_none() {
            payment.gateway_payment_id = Some(gateway_payment_id);
        }
        if payment.status != PaymentStatus::InAnalysis {
            return Ok(Settlement { bill_closed: !self.is_open() });
        }
        Ok(self
            .apply_gateway_status(payment_uuid, status, now)?
            .unwrap_or(Settlement { bill_closed: false }))
    }

    fn payment_idx(&self, payment_uuid: &str) -> Result<usize, BillError> {
        self.payments
            .iter()
            .position(|p| p.payment_uuid == payment_uuid)
            .ok_or(BillError::PaymentNotFound)
    }

    pub fn approve_offline_payment(
        &mut self,
        payment_uuid: &str,
        now: DateTime<Utc>,
    ) -> Result<Settlement, BillError> {
        self.ensure_open()?;
        let idx = self.payment_idx(payment_uuid)?;
        self.payments[idx].approve_offline(now)?;
        Ok(self.settle(idx, now))
    }

    pub fn reject_offline_payment(&mut self, payment_uuid: &str, now: DateTime<Utc>) -> Result<(), BillError> {
        let idx = self.payment_idx(payment_uuid)?;
        self.payments[idx].reject_offline(now)?;
        self.refused(idx);
        Ok(())
    }

    /// Applies a gateway verdict; `None` while the payment is still in analysis.
    /// A charge clearing after the bill was closed keeps its status but is
    /// not counted into what the table paid.
    pub fn apply_gateway_status(
        &mut self,
        payment_uuid: &str,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Settlement>, BillError> {
        let idx = self.payment_idx(payment_uuid)?;
        if !self.payments[idx].apply_gateway_status(status, now)? {
            return Ok(None);
        }
        if self.payments[idx].status.is_settled() {
            if !self.is_open() {
                let p = &self.payments[idx];
                self.events.push(Notification::PaymentAccepted {
                    payment_uuid: p.payment_uuid.clone(),
                    value: p.value,
                });
                return Ok(Some(Settlement { bill_closed: false }));
            }
            return Ok(Some(self.settle(idx, now)));
        }
        self.refused(idx);
        Ok(Some(Settlement { bill_closed: false }))
    }

    fn refused(&mut self, idx: usize) {
        let payment = &self.payments[idx];
        self.events.push(Notification::PaymentRefused {
            payment_uuid: payment.payment_uuid.clone(),
            value: payment.value,
        });
    }

    /// A payment just became settled: count it, release the payer and
    /// close the tab once consumption and couvert are covered.
    fn settle(&mut self, idx: usize, now: DateTime<Utc>) -> Settlement {
        let (value, customer_id, uuid) = {
            let p = &self.payments[idx];
            (p.value, p.customer_id, p.payment_uuid.clone())
        };
        self.value_paid += value;
        self.events.push(Notification::PaymentAccepted { payment_uuid: uuid, value });

        let discounts: Decimal = self.settled_payments().map(|p| p.promotion_value).sum();
        let bill_closed = self.is_open() && self.value_paid >= self.value_without_service_tax() - discounts;
        if bill_closed {
            self.close(now);
        }
        if let Some(customer_id) = customer_id {
            if let Some(member) = self
                .members
                .iter_mut()
                .find(|m| m.customer_id == customer_id && m.is_active())
            {
                member.leave(now);
            }
        }
        Settlement { bill_closed }
    }

    /// Staff takes the whole remainder offline and closes the tab.
    /// `value` defaults to what is still to pay; nothing is recorded when
    /// the table already covered everything.
    pub fn close_with_offline_payment(
        &mut self,
        value: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Option<&BillPayment>, BillError> {
        self.ensure_open()?;
        let remainder = self.still_to_pay();
        let value = value.unwrap_or(remainder);
        if value < Decimal::ZERO {
            return Err(BillError::InvalidPaymentValue);
        }
        if value < remainder {
            return Err(BillError::BelowRemaining);
        }
        if value.is_zero() {
            self.close(now);
            return Ok(None);
        }
        let payment = BillPayment {
            id: None,
            payment_uuid: format!("Staff_{}", uuid::Uuid::new_v4()),
            customer_id: None,
            bill_member_id: None,
            method: PaymentMethod::Offline,
            status: PaymentStatus::OfflineApproved,
            value,
            noruh_fee: Decimal::ZERO,
            gateway_fee: Decimal::ZERO,
            establishment_value: value,
            platform_value: Decimal::ZERO,
            gateway_payment_id: None,
            promotion_id: None,
            promotion_value: Decimal::ZERO,
            date: now,
            status_updated: Some(now),
        };
        self.value_paid += value;
        self.events.push(Notification::PaymentAccepted {
            payment_uuid: payment.payment_uuid.clone(),
            value,
        });
        self.payments.push(payment);
        let idx = self.payments.len() - 1;
        self.close(now);
        Ok(Some(&self.payments[idx]))
    }

    /// Sets the payment date, releases everybody still on the bill and
    /// cancels offline payments no waiter approved yet
    fn close(&mut self, now: DateTime<Utc>) {
        self.payment_date = Some(now);
        for member in self.members.iter_mut().filter(|m| m.is_active()) {
            member.leave(now);
        }
        let mut cancelled = vec![];
        for (idx, payment) in self.payments.iter_mut().enumerate() {
            if payment.status == PaymentStatus::OfflinePending && payment.reject_offline(now).is_ok() {
                cancelled.push(idx);
            }
        }
        for idx in cancelled {
            self.refused(idx);
        }
        self.events.push(Notification::BillClosed);
    }
}
