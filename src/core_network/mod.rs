pub mod data_channel;
pub mod port_pool;
pub mod securable;

pub use data_channel::{DataChannel, DataStream, SinkFn};
pub use port_pool::{PortPool, PortPoolError};
pub use securable::SecurableConn;
