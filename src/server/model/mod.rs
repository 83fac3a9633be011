use serde::Deserialize;

pub(crate) mod bill;
pub(crate) mod config;
pub(crate) mod feedback;
pub(crate) mod order;
pub(crate) mod payment;
pub(crate) mod table;

#[derive(Debug, Deserialize)]
pub(crate) struct CommonRequestParams {
    pub page: Option<u8>,
    pub page_size: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatementQuery {
    pub year: i32,
    pub month: u32,
}
