use serde::{Deserialize, Serialize};

use crate::server::domain::bill::BillId;
use crate::server::domain::establishment::{EstablishmentId, Table, TableId};

#[derive(Debug, Deserialize)]
pub(crate) struct GetTablesQuery {
    pub establishment_id: EstablishmentId,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetTablesResponse {
    pub tables: Vec<TableView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableView {
    pub id: TableId,
    pub name: String,
    pub remote: bool,
    pub available: bool,
    pub bill_ids: Vec<BillId>, // open bills sitting on the table
}

impl TableView {
    pub fn new(table: Table, bill_ids: Vec<BillId>) -> Self {
        Self {
            available: table.enabled && (table.remote || bill_ids.is_empty()),
            id: table.id,
            name: table.name,
            remote: table.remote,
            bill_ids,
        }
    }
}
