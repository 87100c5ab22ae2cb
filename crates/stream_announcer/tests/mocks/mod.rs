pub mod generator;
pub mod history;
