pub mod client;
pub mod messages;
