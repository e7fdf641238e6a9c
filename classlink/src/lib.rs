pub use classlink_core::model::{ParticipantId, Role, SessionId};

pub mod model {
    pub use classlink_core::model::*;
}

#[cfg(feature = "mesh")]
pub mod mesh {
    pub use classlink_mesh::*;
}
