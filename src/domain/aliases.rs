//! Predefined vocabulary for daily bar tables.
//!
//! Column conventions: `open`, `high`, `low`, `close`, the stochastic lines
//! `K`, `D`, `J`, moving averages `ma_<period>` and the boolean markers
//! `first` / `last` for the first and last bar of a series.

use crate::domain::condition::Expr;
use crate::domain::error::ConditionError;
use crate::domain::registry::Registry;
use crate::domain::series::Series;

/// Moving-average periods covered by `close_gt_ma` / `close_lt_ma`.
pub const MA_PERIODS: [u32; 5] = [5, 10, 20, 45, 60];

#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub open: Series,
    pub high: Series,
    pub low: Series,
    pub close: Series,
    pub k: Series,
    pub d: Series,
    pub j: Series,
    /// Number of moving averages the close is above.
    pub close_gt_ma: Series,
    /// Number of moving averages the close is below.
    pub close_lt_ma: Series,
    pub doji: Expr,
    pub black: Expr,
    pub white: Expr,
    pub first_bar: Expr,
    pub last_bar: Expr,

    // Next-bar outcomes measured from today's close. Positive is a gain.
    pub potential_loss_for_long: Series,
    pub potential_profit_for_long: Series,
    pub potential_loss_for_short: Series,
    pub potential_profit_for_short: Series,
    pub profit_for_long: Series,
    pub profit_for_short: Series,
}

impl Vocabulary {
    pub fn new(registry: &Registry) -> Result<Self, ConditionError> {
        let open = registry.indicator("open");
        let high = registry.indicator("high");
        let low = registry.indicator("low");
        let close = registry.indicator("close");

        let mut above = Vec::with_capacity(MA_PERIODS.len());
        let mut below = Vec::with_capacity(MA_PERIODS.len());
        for period in MA_PERIODS {
            let ma = registry.indicator(&format!("ma_{}", period));
            above.push(ma.lt(&close)?);
            below.push(ma.gt(&close)?);
        }

        let next_high = high.shifted(-1)?;
        let next_low = low.shifted(-1)?;
        let next_close = close.shifted(-1)?;

        Ok(Self {
            close_gt_ma: registry.count(above)?,
            close_lt_ma: registry.count(below)?,
            doji: open.equal_to(&close)?,
            black: open.gt(&close)?,
            white: open.lt(&close)?,
            first_bar: registry.flag("first"),
            last_bar: registry.flag("last"),
            potential_loss_for_long: &next_low - &close,
            potential_profit_for_long: &next_high - &close,
            potential_loss_for_short: &close - &next_high,
            potential_profit_for_short: &close - &next_low,
            profit_for_long: &next_close - &close,
            profit_for_short: &close - &next_close,
            k: registry.indicator("K"),
            d: registry.indicator("D"),
            j: registry.indicator("J"),
            open,
            high,
            low,
            close,
        })
    }

    /// Named conditions available as `$name` in signal files.
    pub fn conditions(&self) -> Vec<(&'static str, Expr)> {
        vec![
            ("doji", self.doji.clone()),
            ("black", self.black.clone()),
            ("white", self.white.clone()),
            ("first", self.first_bar.clone()),
            ("last", self.last_bar.clone()),
        ]
    }
}
