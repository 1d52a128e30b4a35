pub mod arrow;
pub mod paths;
pub mod retry;
