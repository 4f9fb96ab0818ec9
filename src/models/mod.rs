pub mod candle;
pub mod order;
pub mod portfolio;
pub mod signal;
