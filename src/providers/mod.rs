//! Backend implementations of the client contract

pub mod dummy;
pub mod http;
pub mod mistral;
pub mod model_server;

// Re-export for convenience
pub use dummy::DummyClient;
pub use mistral::MistralClient;
pub use model_server::ModelServerClient;
