// HTTP surface: settlement workflow plus the pass-through lookups the
// client UI needs (bridge swaps, payout currencies and institutions,
// account verification, indicative rates).
pub mod handler;
pub mod models;
