//! DOM and remote-object data processing
//!
//! Pure data layer between raw CDP JSON and the browser crate: node handles,
//! box-model geometry, attribute decoding, and the property classification
//! used when reading JavaScript objects back over the protocol.
//!
//! Nothing in this crate performs I/O. The browser crate fetches the JSON;
//! this crate turns it into typed values.
//!
//! ```text
//! CDP JSON → BoxModel / BoundingBox / AttributeMap / PropertyView → caller
//! ```

pub mod error;
pub mod remote;
pub mod types;
pub mod utils;

pub use error::{DomError, Result};
pub use remote::{PropertyKind, PropertyView};
pub use types::*;
pub use utils::attributes_from_pairs;
