//! Persistence behind the three repository traits.
//!
//! [`PgStore`] is the production backend; [`MemoryStore`] keeps everything
//! in process and backs development runs and the test suite.

pub mod memory;
pub mod postgres;

pub use crate::auth::repo::UserRepo;
pub use crate::posts::repo::PostRepo;
pub use crate::profiles::repo::ProfileRepo;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Everything the handlers need from persistence.
pub trait Store: UserRepo + ProfileRepo + PostRepo {}

impl<T> Store for T where T: UserRepo + ProfileRepo + PostRepo {}
