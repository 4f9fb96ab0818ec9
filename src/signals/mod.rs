pub mod momentum;
pub mod ranking;
