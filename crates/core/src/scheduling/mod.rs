pub mod availability;
pub mod rules;
pub mod suggest;
