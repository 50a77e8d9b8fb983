pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod model;
pub mod monthly;
pub mod session;
pub mod sorting;
pub mod stats;

pub use error::{EngineError, Result};
pub use session::{Session, SessionId, SessionRegistry};
