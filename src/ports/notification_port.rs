//! Outbound signal delivery.

use crate::domain::error::OrderPointError;
use crate::domain::signal::Signal;

pub trait NotificationPort {
    fn notify(&self, symbol: &str, signal: &Signal) -> Result<(), OrderPointError>;
}
