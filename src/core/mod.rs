// Domain-layer modules and shared errors/models
pub mod schema {
    pub use crate::schema::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod records {
    pub use crate::records::*;
}

pub mod importer {
    pub use crate::importer::*;
}

pub mod access {
    pub use crate::access::*;
}

pub mod errors {
    pub use crate::errors::*;
}
