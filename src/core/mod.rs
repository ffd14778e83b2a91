// Domain-layer modules and shared errors/models
pub mod subscription_timeline {
    pub use crate::subscription_timeline::*;
}

pub mod lead_stage {
    pub use crate::lead_stage::*;
}

pub mod lead_import {
    pub use crate::lead_import::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
