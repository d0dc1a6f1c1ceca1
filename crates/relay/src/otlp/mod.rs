pub mod decode;
pub mod extract;
pub mod grpc;
pub mod http;
