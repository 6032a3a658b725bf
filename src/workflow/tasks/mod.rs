pub mod retry;
pub mod transform;
