pub mod table;
pub mod upstream;

pub use table::{ForwardingTable, RouteError};
pub use upstream::{Forwarder, ProxyError};
