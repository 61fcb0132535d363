pub mod connections;
pub mod users;

pub use connections::{Connection, Status};
pub use users::User;
