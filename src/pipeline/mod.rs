pub mod channel;
pub mod chord;
pub mod grid;
pub mod persistence;
pub mod pitch;
pub mod project;
pub mod subdivision;
