//! Price reduction decision engine.
//!
//! [`evaluate`] is a pure function: it looks at one listing snapshot (plus
//! optional market statistics) and decides whether to reduce and to what
//! price. The caller applies the decision — persisting the new price and
//! calling the marketplace — which keeps the engine independently
//! testable and idempotent for listings whose triggers have not fired.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::market::MarketStats;
use crate::types::Timestamp;

/// Time trigger window when the listing does not configure one.
pub const DEFAULT_TRIGGER_DAYS: i64 = 3;

/// Watch-count threshold when the listing does not configure one.
pub const DEFAULT_WATCH_THRESHOLD: i32 = 5;

/// Market-based pricing undercuts the competitor average by this factor.
const MARKET_UNDERCUT: Decimal = Decimal::from_parts(95, 0, 0, false, 2); // 0.95

/// A single evaluation never drops below half the original price, no
/// matter how the strategy is configured.
const SANITY_FLOOR: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5

/// How the next price is computed once a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `price * (1 - amount/100)`.
    FixedPercentage,
    /// `price - amount`.
    FixedDollar,
    /// Same formula as percentage; the distinction is a UI concern.
    TimeBased,
    /// Undercut the competitor average, bounded by the percentage formula.
    MarketBased,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::FixedPercentage => "fixed_percentage",
            Strategy::FixedDollar => "fixed_dollar",
            Strategy::TimeBased => "time_based",
            Strategy::MarketBased => "market_based",
        }
    }

    /// Parse the database representation. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed_percentage" => Some(Strategy::FixedPercentage),
            "fixed_dollar" => Some(Strategy::FixedDollar),
            "time_based" => Some(Strategy::TimeBased),
            "market_based" => Some(Strategy::MarketBased),
            _ => None,
        }
    }
}

/// Which trigger fired for a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The listing ends within its trigger window.
    EndingSoon,
    /// Watch count is below the interest threshold.
    LowInterest,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::EndingSoon => "time trigger",
            TriggerReason::LowInterest => "low interest",
        }
    }
}

/// The outcome of evaluating one listing for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Reduce to `new_price` (already floor-clamped and rounded).
    Reduce {
        new_price: Decimal,
        reason: TriggerReason,
    },
    /// No trigger fired, or the computed price would not be a reduction.
    Hold,
}

/// The fields of a listing the engine needs, detached from storage.
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    pub current_price: Decimal,
    /// Price at import time; anchors the 50% single-evaluation floor.
    pub original_price: Decimal,
    pub minimum_price: Decimal,
    pub strategy: Strategy,
    /// Percentage or absolute amount, depending on the strategy.
    pub reduction_amount: Decimal,
    pub end_time: Timestamp,
    pub watch_count: i32,
    /// Per-listing override of [`DEFAULT_TRIGGER_DAYS`].
    pub trigger_days: Option<i64>,
    /// Per-listing override of [`DEFAULT_WATCH_THRESHOLD`].
    pub watch_threshold: Option<i32>,
}

/// Evaluate one listing. First matching trigger wins; no trigger means
/// [`Decision::Hold`] and the caller mutates nothing.
///
/// `market` is only consulted by [`Strategy::MarketBased`] and may be
/// `None` for every other strategy (or when the search failed — market
/// data is an enrichment, not a correctness requirement).
pub fn evaluate(listing: &ListingSnapshot, market: Option<&MarketStats>, now: Timestamp) -> Decision {
    let Some(reason) = fired_trigger(listing, now) else {
        return Decision::Hold;
    };

    let computed = compute_price(listing, market);
    let floor = listing
        .minimum_price
        .max(listing.original_price * SANITY_FLOOR);
    let new_price = computed.max(floor).round_dp(2);

    // A "reduction" that does not lower the price is a misconfiguration
    // (negative amount, floor above current); hold rather than raise.
    if new_price >= listing.current_price {
        return Decision::Hold;
    }

    Decision::Reduce { new_price, reason }
}

/// The first trigger that fires, if any.
fn fired_trigger(listing: &ListingSnapshot, now: Timestamp) -> Option<TriggerReason> {
    let window = Duration::days(listing.trigger_days.unwrap_or(DEFAULT_TRIGGER_DAYS));
    let remaining = listing.end_time - now;
    if remaining > Duration::zero() && remaining <= window {
        return Some(TriggerReason::EndingSoon);
    }

    let threshold = listing.watch_threshold.unwrap_or(DEFAULT_WATCH_THRESHOLD);
    if listing.watch_count < threshold {
        return Some(TriggerReason::LowInterest);
    }

    None
}

/// Strategy formula, before floors and rounding.
fn compute_price(listing: &ListingSnapshot, market: Option<&MarketStats>) -> Decimal {
    let percentage_price = listing.current_price
        * (Decimal::ONE - listing.reduction_amount / Decimal::ONE_HUNDRED);

    match listing.strategy {
        Strategy::FixedPercentage | Strategy::TimeBased => percentage_price,
        Strategy::FixedDollar => listing.current_price - listing.reduction_amount,
        Strategy::MarketBased => match market {
            Some(stats) if !stats.has_insufficient_data => match stats.average {
                Some(avg) => (avg * MARKET_UNDERCUT).min(percentage_price),
                None => percentage_price,
            },
            // Insufficient or missing market data: percentage fallback.
            _ => percentage_price,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MatchTier;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn listing(strategy: Strategy, amount: Decimal) -> ListingSnapshot {
        ListingSnapshot {
            current_price: dec!(100),
            original_price: dec!(100),
            minimum_price: dec!(1),
            strategy,
            reduction_amount: amount,
            end_time: Utc::now() + Duration::days(30),
            watch_count: 0, // demand trigger fires by default
            trigger_days: None,
            watch_threshold: None,
        }
    }

    fn stats(average: Decimal, count: usize) -> MarketStats {
        MarketStats {
            tier: MatchTier::Gtin,
            median: Some(average),
            average: Some(average),
            min: Some(average),
            max: Some(average),
            sample_count: count,
            has_insufficient_data: count < 5,
        }
    }

    // -- Triggers -------------------------------------------------------------

    #[test]
    fn time_trigger_fires_inside_window() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(5));
        l.current_price = dec!(100);
        l.minimum_price = dec!(80);
        l.end_time = now + Duration::days(2);
        l.watch_count = 100; // demand trigger must not be the one firing

        assert_eq!(
            evaluate(&l, None, now),
            Decision::Reduce {
                new_price: dec!(95),
                reason: TriggerReason::EndingSoon,
            }
        );
    }

    #[test]
    fn time_trigger_takes_precedence_over_demand() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(5));
        l.end_time = now + Duration::days(1);
        l.watch_count = 0; // both triggers eligible

        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce {
                reason: TriggerReason::EndingSoon,
                ..
            }
        );
    }

    #[test]
    fn ended_listing_does_not_time_trigger() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(5));
        l.end_time = now - Duration::hours(1);
        l.watch_count = 100;

        assert_eq!(evaluate(&l, None, now), Decision::Hold);
    }

    #[test]
    fn demand_trigger_fires_below_threshold() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedDollar, dec!(10));
        l.current_price = dec!(50);
        l.original_price = dec!(50);
        l.minimum_price = dec!(45);
        l.watch_count = 2;

        assert_eq!(
            evaluate(&l, None, now),
            Decision::Reduce {
                new_price: dec!(45), // floor-clamped from 40
                reason: TriggerReason::LowInterest,
            }
        );
    }

    #[test]
    fn no_trigger_holds_and_holds_again() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(5));
        l.watch_count = 50;

        // Evaluating twice with unchanged inputs produces two holds.
        assert_eq!(evaluate(&l, None, now), Decision::Hold);
        assert_eq!(evaluate(&l, None, now), Decision::Hold);
    }

    #[test]
    fn custom_trigger_window_is_respected() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(5));
        l.end_time = now + Duration::days(6);
        l.watch_count = 100;
        l.trigger_days = Some(7);

        assert_matches::assert_matches!(evaluate(&l, None, now), Decision::Reduce { .. });
    }

    // -- Price computation ------------------------------------------------------

    #[test]
    fn percentage_strategy_reduces_by_percent() {
        let now = Utc::now();
        let l = listing(Strategy::FixedPercentage, dec!(10));
        assert_eq!(
            evaluate(&l, None, now),
            Decision::Reduce {
                new_price: dec!(90),
                reason: TriggerReason::LowInterest,
            }
        );
    }

    #[test]
    fn time_based_uses_percentage_formula() {
        let now = Utc::now();
        let l = listing(Strategy::TimeBased, dec!(20));
        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce { new_price, .. } if new_price == dec!(80)
        );
    }

    #[test]
    fn market_strategy_undercuts_average() {
        let now = Utc::now();
        let l = listing(Strategy::MarketBased, dec!(5));
        let m = stats(dec!(90), 8);
        // min(90 * 0.95, 100 * 0.95) = 85.5
        assert_matches::assert_matches!(
            evaluate(&l, Some(&m), now),
            Decision::Reduce { new_price, .. } if new_price == dec!(85.50)
        );
    }

    #[test]
    fn market_strategy_bounded_by_percentage_formula() {
        let now = Utc::now();
        let l = listing(Strategy::MarketBased, dec!(5));
        let m = stats(dec!(150), 8);
        // Competitors are pricier: 150 * 0.95 > 95, so the percentage
        // formula wins.
        assert_matches::assert_matches!(
            evaluate(&l, Some(&m), now),
            Decision::Reduce { new_price, .. } if new_price == dec!(95)
        );
    }

    #[test]
    fn market_strategy_falls_back_on_insufficient_data() {
        let now = Utc::now();
        let l = listing(Strategy::MarketBased, dec!(5));
        let m = stats(dec!(10), 2); // insufficient
        assert_matches::assert_matches!(
            evaluate(&l, Some(&m), now),
            Decision::Reduce { new_price, .. } if new_price == dec!(95)
        );
    }

    #[test]
    fn market_strategy_falls_back_without_stats() {
        let now = Utc::now();
        let l = listing(Strategy::MarketBased, dec!(5));
        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce { new_price, .. } if new_price == dec!(95)
        );
    }

    // -- Floors -------------------------------------------------------------------

    #[test]
    fn reduction_never_goes_below_minimum_price() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedDollar, dec!(60));
        l.current_price = dec!(100);
        l.minimum_price = dec!(70);
        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce { new_price, .. } if new_price == dec!(70)
        );
    }

    #[test]
    fn reduction_never_goes_below_half_original_price() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(90));
        l.current_price = dec!(100);
        l.original_price = dec!(100);
        l.minimum_price = dec!(1);
        // 90% off would be 10; the sanity floor holds at 50.
        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce { new_price, .. } if new_price == dec!(50)
        );
    }

    #[test]
    fn floored_price_at_or_above_current_holds() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedDollar, dec!(5));
        l.current_price = dec!(45);
        l.minimum_price = dec!(45);
        assert_eq!(evaluate(&l, None, now), Decision::Hold);
    }

    #[test]
    fn negative_amount_cannot_raise_price() {
        let now = Utc::now();
        let l = listing(Strategy::FixedDollar, dec!(-10));
        assert_eq!(evaluate(&l, None, now), Decision::Hold);
    }

    #[test]
    fn prices_round_to_cents() {
        let now = Utc::now();
        let mut l = listing(Strategy::FixedPercentage, dec!(3));
        l.current_price = dec!(19.99);
        l.original_price = dec!(19.99);
        // 19.99 * 0.97 = 19.3903 -> 19.39
        assert_matches::assert_matches!(
            evaluate(&l, None, now),
            Decision::Reduce { new_price, .. } if new_price == dec!(19.39)
        );
    }
}
