mod delivery_record;
mod failure_record;
mod feed;
mod feed_connection;

pub use delivery_record::*;
pub use failure_record::*;
pub use feed::*;
pub use feed_connection::*;
