//! Per-student card rendering.
//!
//! [`card::CardContent`] extracts everything a card shows from one record; the raster and
//! document renderers only decide where it goes.

pub mod card;
pub mod docx;
pub mod raster;

pub use card::{CardContent, CardField, SchoolIdentity};
pub use raster::{CardImages, FontBook};
