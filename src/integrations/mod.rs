//! External service integrations.

pub mod object_store {
    pub use crate::object_store::*;
}

pub mod azure_blob {
    pub use crate::azure_blob::*;
}

pub mod client_store {
    pub use crate::client_store::*;
}
