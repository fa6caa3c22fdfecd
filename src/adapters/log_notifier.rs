//! Notification adapter that writes signals to the log.

use crate::domain::error::OrderPointError;
use crate::domain::signal::Signal;
use crate::ports::notification_port::NotificationPort;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

/// One-line summary of a signal.
pub fn format_signal(symbol: &str, signal: &Signal) -> String {
    let mut line = format!(
        "{} {} @ {:.4} (confidence {:.2}, score {:+.2}) entry {:.4}-{:.4} stop {:.4} tp1 {:.4} tp2 {:.4}",
        symbol,
        signal.strength(),
        signal.close,
        signal.confidence,
        signal.score,
        signal.entry_low,
        signal.entry_high,
        signal.stop_loss,
        signal.take_profit_1,
        signal.take_profit_2,
    );
    if !signal.contributing_reasons.is_empty() {
        line.push_str(" [");
        line.push_str(&signal.contributing_reasons.join("; "));
        line.push(']');
    }
    line
}

impl NotificationPort for LogNotifier {
    fn notify(&self, symbol: &str, signal: &Signal) -> Result<(), OrderPointError> {
        log::info!("{} at {}", format_signal(symbol, signal), signal.timestamp);
        Ok(())
    }
}
