//! Stock-to-flow valuation heuristic: a simpler alternative to the power law,
//! driven only by the issuance schedule.

const INITIAL_SUBSIDY_BTC: f64 = 50.0;
const BLOCKS_PER_HALVING: f64 = 210_000.0;
const BLOCKS_PER_DAY: f64 = 144.0;

/// `ln(market value) = 14.6 + 3.3 * ln(SF)`
const SF_LN_INTERCEPT: f64 = 14.6;
const SF_EXPONENT: f64 = 3.3;

fn blocks_at(days: i64) -> f64 {
    days.max(0) as f64 * BLOCKS_PER_DAY
}

fn subsidy_at_block(block: f64) -> f64 {
    let epoch = (block / BLOCKS_PER_HALVING).floor();
    INITIAL_SUBSIDY_BTC / 2f64.powf(epoch)
}

/// Coins issued after `days` days, following the halving schedule.
pub fn supply_at(days: i64) -> f64 {
    let mut remaining = blocks_at(days);
    let mut subsidy = INITIAL_SUBSIDY_BTC;
    let mut supply = 0.0;
    while remaining > 0.0 && subsidy > 1e-8 {
        let in_epoch = remaining.min(BLOCKS_PER_HALVING);
        supply += in_epoch * subsidy;
        remaining -= in_epoch;
        subsidy /= 2.0;
    }
    supply
}

/// Coins issued per year at the subsidy in force on day `days`.
pub fn annual_flow_at(days: i64) -> f64 {
    subsidy_at_block(blocks_at(days)) * BLOCKS_PER_DAY * 365.0
}

/// Ratio of outstanding supply to annual issuance.
pub fn stock_to_flow(days: i64) -> Option<f64> {
    let flow = annual_flow_at(days);
    let supply = supply_at(days);
    (flow > 0.0 && supply > 0.0).then(|| supply / flow)
}

/// Per-coin USD price implied by the stock-to-flow regression.
pub fn s2f_price(days: i64) -> Option<f64> {
    let sf = stock_to_flow(days)?;
    let supply = supply_at(days);
    let market_value = (SF_LN_INTERCEPT + SF_EXPONENT * sf.ln()).exp();
    Some(market_value / supply)
}
