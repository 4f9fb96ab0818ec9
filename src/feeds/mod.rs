pub mod history;
pub mod sector_map;
pub mod universe;
