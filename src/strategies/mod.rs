pub mod momentum_swing;
pub mod rebalance;
