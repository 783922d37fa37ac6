pub mod session_repo;
pub mod user_repo;

pub use session_repo::{SessionError, SessionRepo};
pub use user_repo::{PgUserStore, UserStore, UserStoreError};
