//! Administrative access for filedrop.
//!
//! A single shared passcode unlocks the admin view. A successful check yields
//! an [`AdminToken`], which every rename or delete must present.

mod gate;
mod mutator;

pub use gate::{AdminClaims, AdminGate, AdminToken};
pub use mutator::AdminMutator;
