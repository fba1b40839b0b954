pub mod base;
pub mod chat;
pub mod organization;
pub mod project;
pub mod team;
pub mod user;

pub use base::BaseDao;
