pub mod bill;
pub mod error;
pub mod establishment;
pub mod evaluation;
pub mod member;
pub mod money;
pub mod order;
pub mod payment;
pub mod report;
