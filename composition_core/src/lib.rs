//! # Composition Core
//!
//! The composition engine behind every building and item in the game.
//! Trait levels declare fields, events, handlers and capabilities; the engine
//! flattens a hierarchy of them into one fixed-layout record schema and one
//! ordered handler table per concrete class, then registers the class in its
//! family so it can be constructed by name.
//!
//! ## Core Components
//!
//! - **schema**: Field Composer and the fixed-layout [`Record`]
//! - **events**: event declarations, handler tables and dispatch randomness
//! - **class**: trait levels, composed classes and live instances
//! - **family**: name-keyed registries of concrete classes

pub mod class;
pub mod entities;
pub mod error;
pub mod events;
pub mod family;
pub mod schema;

pub use class::*;
pub use entities::*;
pub use error::*;
pub use events::*;
pub use family::*;
pub use schema::*;
