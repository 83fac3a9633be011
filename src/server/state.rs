use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Client;

use crate::server::controller::error::CustomError;
use crate::server::database::connection::Connection;
use crate::server::database::pool::Pool;
use crate::server::domain::payment::GatewayRates;
use crate::server::gateway::PaymentGateway;
use crate::server::notify::Notifier;

#[derive(Clone)]
pub(crate) struct AppState {
    db_read_pool: Pool<Client>,
    db_write_pool: Pool<Client>,
    pub db_timeout: Duration,
    /// how long one gateway call may take, bounds when an unanswered charge is given up on
    pub gateway_timeout: Duration,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub rates: GatewayRates,
}

impl AppState {
    pub fn new(
        db_read_pool: Pool<Client>,
        db_write_pool: Pool<Client>,
        db_timeout: Duration,
        gateway_timeout: Duration,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        rates: GatewayRates,
    ) -> Self {
        Self {
            db_read_pool,
            db_write_pool,
            db_timeout,
            gateway_timeout,
            gateway,
            notifier,
            rates,
        }
    }

    pub async fn read_conn(&self) -> Result<Connection<Client>, CustomError> {
        self.db_read_pool
            .acquire(self.db_timeout)
            .await
            .ok_or(CustomError::ServerIsBusy)
    }

    pub async fn write_conn(&self) -> Result<Connection<Client>, CustomError> {
        self.db_write_pool
            .acquire(self.db_timeout)
            .await
            .ok_or(CustomError::ServerIsBusy)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::server::domain::payment::PaymentStatus;
    use crate::server::gateway::tests::FixedGateway;
    use crate::server::notify::LogNotifier;

    /// State without any database connection behind it
    pub(crate) fn offline_state() -> AppState {
        AppState::new(
            Pool::empty("read"),
            Pool::empty("write"),
            Duration::from_millis(10),
            Duration::from_millis(10),
            Arc::new(FixedGateway::new(PaymentStatus::Authorized)),
            Arc::new(LogNotifier),
            GatewayRates::default(),
        )
    }

    #[actix_web::test]
    async fn empty_pools_report_busy() {
        let state = offline_state();
        assert!(matches!(state.read_conn().await, Err(CustomError::ServerIsBusy)));
        assert!(matches!(state.write_conn().await, Err(CustomError::ServerIsBusy)));
    }
}
