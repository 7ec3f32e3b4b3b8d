//! Armada Core
//!
//! Provider-agnostic building blocks for mapping declarative resource
//! configurations onto Azure Resource Manager calls

pub mod codec;
pub mod differ;
pub mod lifecycle;
pub mod lro;
pub mod provider;
pub mod resource;
pub mod resource_id;
pub mod schema;

#[doc(hidden)]
pub mod __private {
    pub use serde;
    pub use serde_json;
}
