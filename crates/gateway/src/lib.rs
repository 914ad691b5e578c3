pub mod config;
pub mod decode;
pub mod dispatch;
pub mod encode;
pub mod routes;
pub mod session;
pub mod state;
pub mod status;
