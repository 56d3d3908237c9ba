pub mod booking;
pub mod resource;
pub mod rule;
pub mod work_item;
pub mod workflow;
