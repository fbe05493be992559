pub mod college;
pub mod ride;
pub mod session;
pub mod user;
