pub mod chat;
pub mod message;
pub mod organization;
pub mod project;
pub mod team;
pub mod user;

pub use chat::*;
pub use message::*;
pub use organization::*;
pub use project::*;
pub use team::*;
pub use user::*;
