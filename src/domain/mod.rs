mod connection;
mod connection_name;
mod delivery;
mod feed;

pub use connection::*;
pub use connection_name::ConnectionName;
pub use delivery::*;
pub use feed::*;
