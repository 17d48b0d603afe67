pub mod http;
pub mod logging;
pub mod server;

pub use http::{router, HttpServer, ServerConfig};
pub use logging::{init_logging, init_test_logging};
pub use server::{RpcServer, ServerError};
