mod protocol;

pub use protocol::client::*;
pub use protocol::messages::*;
