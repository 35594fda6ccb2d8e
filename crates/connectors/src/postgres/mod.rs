pub mod client;
pub mod copy;
pub mod encoder;
pub mod serializer;
pub mod session;
