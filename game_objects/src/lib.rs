//! # Game Objects
//!
//! The building and item families of the game, defined on top of
//! `composition_core`. Each family starts with its abstract trait levels;
//! concrete classes are added in code or loaded from TOML content files and
//! then spawned by name.
//!
//! ## Modules
//!
//! - **buildings**: placeable, breakable structures
//! - **items**: carried objects, optionally stackable
//! - **content**: data-driven class definitions
//! - **world**: the entity collection a map owns and ticks

pub mod buildings;
pub mod content;
pub mod error;
pub mod items;
pub mod world;

pub use buildings::*;
pub use content::*;
pub use error::*;
pub use items::*;
pub use world::*;
