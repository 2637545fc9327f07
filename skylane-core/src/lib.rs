pub mod booking;
pub mod error;
pub mod flight;
pub mod money;
pub mod payment;
pub mod provider;
pub mod reference;
pub mod repository;

pub use error::{LifecycleError, StoreError};

pub type LifecycleResult<T> = Result<T, LifecycleError>;
