pub mod error;
pub mod repo;
pub mod repo_types;

pub use error::UserError;
pub use repo::UserRepository;
pub use repo_types::{CreatedUser, NewUser, Role, User};
