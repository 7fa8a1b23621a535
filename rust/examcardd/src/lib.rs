pub mod assets;
pub mod batch;
pub mod db;
pub mod ident;
pub mod ipc;
pub mod photos;
pub mod render;
pub mod roster;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod sheet;
pub mod template;
