pub mod caller;
pub mod carrier;
pub mod entity;
pub mod intent;
pub mod operations;
pub mod result;
pub mod slot;
