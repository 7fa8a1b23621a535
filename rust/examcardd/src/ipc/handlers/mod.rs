pub mod cards;
pub mod core;
pub mod photos;
pub mod schedule;
pub mod settings;
pub mod students;
pub mod templates;
