//! Market data access port trait.

use crate::domain::error::OrderPointError;
use crate::domain::ohlcv::BarSeries;
use crate::domain::timeframe::Timeframe;

pub trait MarketDataPort {
    /// Bars for `symbol`, oldest first. With `limit`, only the most recent
    /// `limit` bars are returned.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<BarSeries, OrderPointError>;

    fn list_symbols(&self) -> Result<Vec<String>, OrderPointError>;
}
