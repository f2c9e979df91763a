//! Bearer token model and the session collaborator the client reports to.

pub mod session;
pub mod token;

pub use session::*;
pub use token::*;
