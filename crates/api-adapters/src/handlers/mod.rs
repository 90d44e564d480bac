//! Request handlers, one module per resource. Handlers validate and
//! translate; all decisions live in the service layer.

pub mod ads;
pub mod articles;
pub mod boards;
pub mod comments;
pub mod health;
pub mod messages;
pub mod users;
