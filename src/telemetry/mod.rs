pub mod alerts;
pub mod timing;
