use derive_more::{Display, Error};

/// Business rule violations on a bill and everything hanging off it
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub(crate) enum BillError {
    #[display("establishment is disabled")]
    EstablishmentDisabled,
    #[display("table does not exist in this establishment")]
    TableNotFound,
    #[display("table is not available")]
    TableNotAvailable,
    #[display("customer already has an open bill")]
    OpenBillExists,
    #[display("bill has already been paid")]
    BillClosed,
    #[display("customer is not part of this bill")]
    NotBillMember,
    #[display("only the bill owner can do this")]
    NotBillOwner,
    #[display("no pending join request for this customer")]
    JoinRequestNotFound,
    #[display("cannot leave a bill with live orders")]
    CannotLeaveBill,
    #[display("item does not belong to this establishment")]
    ItemNotInEstablishment,
    #[display("item is not available")]
    ItemUnavailable,
    #[display("quantity must be at least one")]
    InvalidQuantity,
    #[display("no offer left to use on this bill")]
    OfferLimitReached,
    #[display("item does not belong to the offer category")]
    ItemNotInOfferCategory,
    #[display("order not found on this bill")]
    OrderNotFound,
    #[display("order cannot go from {from} to {to}")]
    InvalidOrderTransition {
        from: &'static str,
        to: &'static str,
    },
    #[display("order was already finished by the kitchen")]
    CannotCancelOrder,
    #[display("only the customer who ordered can cancel it")]
    NotOrderOwner,
    #[display("payment value must be positive")]
    InvalidPaymentValue,
    #[display("a payment with this uuid already exists")]
    DuplicatePayment,
    #[display("this member has already paid")]
    AlreadyPaid,
    #[display("the last member must pay the whole bill")]
    MustPayWholeBill,
    #[display("payment exceeds what is missing from the bill")]
    ExceedsRemaining,
    #[display("platform fee must match the establishment's fee")]
    InvalidPlatformFee,
    #[display("platform fee was already paid by every customer")]
    FeeLimitReached,
    #[display("promocode does not exist")]
    PromotionNotFound,
    #[display("promocode was already used on this bill")]
    PromotionAlreadyUsed,
    #[display("promocode is disabled")]
    PromotionDisabled,
    #[display("closing value is below what is still to pay")]
    BelowRemaining,
    #[display("payment not found on this bill")]
    PaymentNotFound,
    #[display("payment cannot go from {from} to {to}")]
    InvalidPaymentTransition {
        from: &'static str,
        to: &'static str,
    },
    #[display("customer has not paid this bill yet")]
    NotPaidYet,
    #[display("customer already rated this bill")]
    AlreadyRated,
    #[display("rating must be between 1 and 5")]
    InvalidRating,
}
