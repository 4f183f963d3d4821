pub mod order;
pub mod snapshot;
pub mod status;
