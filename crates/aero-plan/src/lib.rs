pub mod astar;
pub mod doctor;
pub mod error;
pub mod frame;
pub mod grid;
pub mod prune;
pub mod route;
pub mod survey;

pub use error::PlanError;
