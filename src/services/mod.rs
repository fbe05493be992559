pub mod rides;
pub mod users;
