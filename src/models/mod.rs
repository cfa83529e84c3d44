//! Domain model module declarations.

pub mod channel_format;
pub mod installation;
pub mod message;
pub mod participation;
pub mod workspace;
