//! Configuration for building and connecting clients

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::params::ClientArgs;
use crate::ClientKind;

/// Which backend to build and how to connect it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig
{   /// Backend variant
    pub client: ClientKind
  , /// Connection string (API key, server URL, ...)
    #[serde(default)]
    pub connection_str: Option<String>
  , /// Backend arguments; unrecognized keys are reported, not applied
    #[serde(default)]
    pub client_args: ClientArgs
}

impl ClientConfig
{   pub fn new(client: ClientKind) -> Self
    {   ClientConfig
        {   client
          , connection_str: None
          , client_args: ClientArgs::new()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self>
    {   serde_json::from_str(json).map_err(|e| {
          Error::InvalidArgument(format!("bad client config: {}", e))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self>
    {   let path = path.as_ref();
        debug!("Loading client config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
          Error::InvalidArgument(
            format!("cannot read {}: {}", path.display(), e)
          )
        })?;
        Self::from_json_str(&text)
    }

    /// Build the backend and connect it
    pub fn connect(&self) -> Result<Box<dyn Client>>
    {   let mut client = self.client.build();
        let mut args = self.client_args.clone();
        client.connect(self.connection_str.as_deref(), &mut args)?;

        for key in args.keys()
        {   warn!(
              "Ignoring unrecognized client arg '{}' for {}",
              key, self.client
            );
        }
        Ok(client)
    }
}
