//! Consent-domain identifiers, consent and token models, and timestamp helpers.

pub mod consent;
pub mod id;
pub mod timestamp;
pub mod token;

pub use consent::*;
pub use id::*;
pub use timestamp::*;
pub use token::{secret::*, *};
