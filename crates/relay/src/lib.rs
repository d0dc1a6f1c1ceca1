pub mod hub;
pub mod otlp;
pub mod publish;
pub mod push;
pub mod relay;
pub mod server;
