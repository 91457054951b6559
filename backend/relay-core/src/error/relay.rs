use crate::error::broker::BrokerError;
use crate::error::router::RouterError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Router(#[from] RouterError),
}
