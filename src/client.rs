//! The contract every generation backend implements

use std::collections::BTreeMap;

use crate::deferred::DeferredResult;
use crate::error::{Error, Result};
use crate::params::{ClientArgs, ModelParams, RequestParams};
use crate::request::Request;

/// Request building hands back the operation and its cache key
pub type BuiltRequest = (DeferredResult, RequestParams);

/// Generation backend contract.
///
/// Lifecycle: `connect` once, build any number of requests, `close`.
/// Request building never performs I/O; it only returns a
/// `DeferredResult` for the caller to run.
pub trait Client: Send
{   /// Initialize from an optional connection string and client args.
    /// Every recognized key is removed from `client_args`.
    fn connect(
      &mut self
    , connection_str: Option<&str>
    , client_args: &mut ClientArgs
    ) -> Result<()>;

    /// Release held resources. Safe on any state; always terminal.
    fn close(&mut self);

    /// Endpoint or identifier, stable for a given configuration
    fn get_generation_url(&self) -> String;

    /// Whether a batch prompt can be served as one call
    fn supports_batch_inference(&self) -> bool;

    /// Whether `get_choice_logit_request` is available
    fn supports_choice_logits(&self) -> bool
    {   true
    }

    /// Transport headers (auth, ...)
    fn get_generation_header(&self) -> BTreeMap<String, String>;

    /// Identifying params callers fold into every cache key
    fn get_model_params(&self) -> ModelParams;

    /// Free-form generation: `num_results * n` choices
    fn get_request(&self, request: &Request) -> Result<BuiltRequest>;

    /// Pick one of `gold_choices` per prompt
    fn get_choice_logit_request(
      &self
    , gold_choices: &[String]
    , request: &Request
    ) -> Result<BuiltRequest>;
}

/// Connection lifecycle shared by all backends
#[derive(Debug, Clone)]
pub enum ClientState<T>
{   Uninitialized
  , Connected(T)
  , Closed
}

impl<T> Default for ClientState<T>
{   fn default() -> Self
    {   ClientState::Uninitialized
    }
}

impl<T> ClientState<T>
{   /// Configuration of a connected client, `NotConnected` otherwise
    pub fn connected(&self) -> Result<&T>
    {   match self
        {   ClientState::Connected(config) => Ok(config)
          , _ => Err(Error::NotConnected)
        }
    }

    pub fn is_connected(&self) -> bool
    {   matches!(self, ClientState::Connected(_))
    }

    /// Fails unless the client has never been connected
    pub fn ensure_uninitialized(&self) -> Result<()>
    {   match self
        {   ClientState::Uninitialized => Ok(())
          , ClientState::Connected(_) => Err(Error::ConnectionError(
              "client is already connected".to_string()
            ))
          , ClientState::Closed => Err(Error::ConnectionError(
              "client is closed; create a new instance".to_string()
            ))
        }
    }

    /// Move to `Closed`, handing back the old configuration if any
    pub fn close(&mut self) -> Option<T>
    {   match std::mem::replace(self, ClientState::Closed)
        {   ClientState::Connected(config) => Some(config)
          , _ => None
        }
    }
}

/// Scoring params are keyed only on what is scored
pub fn choice_logit_params(
  gold_choices: &[String]
, request: &Request
) -> Result<(usize, RequestParams)>
{   let num_results = request.num_results()?;
    if gold_choices.is_empty()
    {   return Err(Error::invalid("gold_choices is empty"));
    }
    let mut params = RequestParams::new();
    params.insert("prompt", request.prompt.to_value());
    params.insert("gold_choices", gold_choices.to_vec());
    Ok((num_results, params))
}
