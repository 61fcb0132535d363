pub mod choices;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod store;
pub mod token;
pub mod utils;

pub use choices::{Choice, ChoiceOptions};
pub use db::PgConnectionStore;
pub use error::{Error, Result};
pub use models::{Connection, Status, User};
pub use repository::ConnectionRepository;
pub use store::{
    ConnectionFilter, ConnectionOrder, ConnectionStore, MemoryConnectionStore, NewConnection,
    UserDirectory,
};
pub use utils::config::Config;

// Re-export common types
pub use chrono::{DateTime, Utc};
pub use sqlx::PgPool;
pub use uuid::Uuid;
