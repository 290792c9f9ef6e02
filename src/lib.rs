pub mod error;
pub mod config;
pub mod params;
pub mod providers;
pub mod request;
pub mod deferred;
pub mod client;
pub mod session;
pub mod backend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/*

promptkit: one request contract for every text-generation backend.
A backend turns a Request into (deferred call, cache-key params);
the caller decides when (and whether) the call runs.

promptkit/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports, ClientKind factory, logging init
│   ├── error.rs        # Error kinds
│   ├── params.rs       # Parameter tables, RequestParams cache keys
│   ├── request.rs      # Request / raw response types
│   ├── deferred.rs     # DeferredResult thunk
│   ├── client.rs       # Client trait and lifecycle state
│   ├── config.rs       # ClientConfig (JSON) -> connected client
│   ├── session.rs      # Cache-aware caller flow
│   ├── backend.rs      # Actor handle serializing access to a client
│   └── providers/
│       ├── dummy.rs         # Identity test double
│       ├── mistral.rs       # Mistral chat completions
│       ├── model_server.rs  # Self-hosted completion server
│       └── http.rs          # JSON-over-HTTP helper
└── tests/

*/

pub use client::{BuiltRequest, Client, ClientState};
pub use config::ClientConfig;
pub use deferred::DeferredResult;
pub use error::{Error, ErrorKind, Result};
pub use params::{
  ClientArgs, ModelParams, ParamDefault, ParamSpec, ParameterMap,
  RequestParams,
};
pub use request::{Prompt, RawChoice, RawResponse, Request};
pub use session::{MemoryCache, ResponseCache, Session};
pub use backend::ClientBackend;

/// Every backend this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind
{   /// Identity responses, no I/O (testing)
    Dummy
  , /// Mistral AI chat completions API
    Mistral
  , /// Self-hosted completion server (local models)
    ModelServer
}

impl ClientKind
{   /// Build an unconnected client of this kind
    pub fn build(&self) -> Box<dyn Client>
    {   match self
        {   ClientKind::Dummy => {
              Box::new(providers::DummyClient::new())
            }
          , ClientKind::Mistral => {
              Box::new(providers::MistralClient::new())
            }
          , ClientKind::ModelServer => {
              Box::new(providers::ModelServerClient::new())
            }
        }
    }

    pub fn as_str(&self) -> &'static str
    {   match self
        {   ClientKind::Dummy => "dummy"
          , ClientKind::Mistral => "mistral"
          , ClientKind::ModelServer => "model_server"
        }
    }
}

impl fmt::Display for ClientKind
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.write_str(self.as_str())
    }
}

impl FromStr for ClientKind
{   type Err = Error;

    fn from_str(s: &str) -> Result<Self>
    {   match s
        {   "dummy" => Ok(ClientKind::Dummy)
          , "mistral" => Ok(ClientKind::Mistral)
          , "model_server" => Ok(ClientKind::ModelServer)
          , other => Err(Error::InvalidArgument(
              format!("unknown client: {}", other)
            ))
        }
    }
}

/// Build and connect a client in one step
pub fn connect(
  kind: ClientKind
, connection_str: Option<&str>
, client_args: &mut ClientArgs
) -> Result<Box<dyn Client>>
{   let mut client = kind.build();
    client.connect(connection_str, client_args)?;
    Ok(client)
}

/// Install env_logger, honoring RUST_LOG (default: info).
/// Safe to call more than once.
pub fn init_logging()
{   let _ = env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
