//! Shared resource types for Thingcast.
//!
//! This crate is the single source of truth for the resources ("things")
//! the server exposes and the mutator publishes. Types flow downstream to
//! `TypeScript` via `ts-rs` for the live demo page.
//!
//! # Modules
//!
//! - [`ids`] -- Validated string identifier for things
//! - [`enums`] -- The fixed color and type enumerations
//! - [`thing`] -- The [`Thing`] snapshot and its wire representations
//! - [`channel`] -- Broadcast channel addressing (per-thing and `all`)

pub mod channel;
pub mod enums;
pub mod ids;
pub mod thing;

pub use channel::Channel;
pub use enums::{ThingColor, ThingType, UnknownVariant};
pub use ids::{IdError, ThingId};
pub use thing::Thing;

#[cfg(test)]
mod tests {
    #[test]
    fn export_bindings() {
        // Generates the TypeScript definitions under `bindings/`.
        use ts_rs::TS;

        let _ = crate::enums::ThingColor::export_all();
        let _ = crate::enums::ThingType::export_all();
        let _ = crate::thing::Thing::export_all();
    }
}
