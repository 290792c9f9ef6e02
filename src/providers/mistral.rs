use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::{BuiltRequest, Client, ClientState};
use crate::deferred::DeferredResult;
use crate::error::{Error, Result};
use crate::params::{
  ClientArgs, GenerationDefaults, ModelParams, ParamDefault, ParamSpec,
  ParameterMap, RequestParams,
};
use crate::providers::http::{endpoint, post_json};
use crate::request::{Prompt, RawChoice, RawResponse, Request};

pub const MISTRAL_API_BASE: &str
  = "https://api.mistral.ai/v1";

pub const MISTRAL_API_KEY_ENV: &str = "MISTRAL_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User param -> (client param, default)
pub const MISTRAL_PARAMS: ParameterMap = ParameterMap(&[
  ParamSpec::new("model", "model", ParamDefault::Str("mistral-small-latest"))
, ParamSpec::new("temperature", "temperature", ParamDefault::Float(0.7))
, ParamSpec::new("max_tokens", "max_tokens", ParamDefault::Int(1024))
, ParamSpec::new("top_p", "top_p", ParamDefault::Float(1.0))
, ParamSpec::new("n", "n", ParamDefault::Int(1))
]);

// ===== Message Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistralChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub max_tokens: usize
  , pub temperature: f64
  , pub top_p: f64
  , pub n: usize
  , pub stream: bool
}

impl MistralChatRequest
{   /// Build the wire body from normalized params
    pub fn from_params(params: &RequestParams) -> Result<Self>
    {   let prompt = params.get_str("prompt")?;
        Ok(MistralChatRequest
        {   model: params.get_str("model")?.to_string()
          , messages: vec![
              ChatMessage
              {   role: "user".to_string()
                , content: prompt.to_string()
              }
            ]
          , max_tokens: params.count("max_tokens")?
          , temperature: params.get_f64("temperature")?
          , top_p: params.get_f64("top_p")?
          , n: params.total_choices("n", 1)?
          , stream: false
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MistralChatResponse
{   pub choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ChatMessage
  , pub finish_reason: Option<String>
}

impl From<MistralChatResponse> for RawResponse
{   fn from(response: MistralChatResponse) -> Self
    {   RawResponse
        {   choices: response.choices
              .into_iter()
              .map(|c| RawChoice { text: c.message.content })
              .collect()
        }
    }
}

// ===== Mistral Client =====

/// State held between connect and close
#[derive(Debug, Clone)]
pub struct MistralConfig
{   api_key: String
  , api_base: String
  , defaults: GenerationDefaults
  , http_client: reqwest::Client
}

/// Mistral chat completions backend.
///
/// One prompt per call: batch prompts are rejected and must be split
/// by the caller. Choice scoring is not offered.
#[derive(Debug, Default)]
pub struct MistralClient
{   state: ClientState<MistralConfig>
}

impl MistralClient
{   pub fn new() -> Self
    {   debug!("Creating MistralClient");
        MistralClient::default()
    }

    fn resolve_api_key(
      connection_str: Option<&str>
    , client_args: &mut ClientArgs
    ) -> Result<String>
    {   let from_args = match client_args.remove("api_key")
        {   Some(Value::String(key)) => Some(key)
          , None | Some(Value::Null) => None
          , Some(other) => {
              return Err(Error::ConnectionError(
                format!("api_key must be a string, got {}", other)
              ));
            }
        };

        if let Some(key) = connection_str.map(String::from)
        {   debug!("Using API key from connection string");
            return Ok(key);
        }
        if let Some(key) = from_args
        {   debug!("Using API key from client args");
            return Ok(key);
        }
        if let Ok(key) = std::env::var(MISTRAL_API_KEY_ENV)
        {   debug!("Using API key from {}", MISTRAL_API_KEY_ENV);
            return Ok(key);
        }

        error!("No Mistral API key");
        Err(Error::ConnectionError(format!(
          "Mistral API key missing: pass a connection string, \
           an api_key arg or set {}",
          MISTRAL_API_KEY_ENV
        )))
    }
}

impl Client for MistralClient
{   fn connect(
      &mut self
    , connection_str: Option<&str>
    , client_args: &mut ClientArgs
    ) -> Result<()>
    {   self.state.ensure_uninitialized()?;
        let api_key = Self::resolve_api_key(connection_str, client_args)?;
        if api_key.trim().is_empty()
        {   return Err(Error::ConnectionError(
              "Mistral API key is empty".to_string()
            ));
        }

        let api_base = match client_args.remove("api_base")
        {   Some(Value::String(base)) => base
          , None | Some(Value::Null) => MISTRAL_API_BASE.to_string()
          , Some(other) => {
              return Err(Error::ConnectionError(
                format!("api_base must be a string, got {}", other)
              ));
            }
        };
        let timeout_secs = match client_args.remove("timeout_secs")
        {   None | Some(Value::Null) => DEFAULT_TIMEOUT_SECS
          , Some(v) => v.as_u64()
              .filter(|secs| *secs > 0)
              .ok_or_else(|| Error::ConnectionError(
                format!("timeout_secs must be a positive integer, got {}", v)
              ))?
        };
        let defaults = MISTRAL_PARAMS.take_client_args(client_args)?;

        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(timeout_secs))
          .build()
          .map_err(|e| Error::ConnectionError(e.to_string()))?;

        debug!("Mistral client connected to {}", api_base);
        self.state = ClientState::Connected(MistralConfig
        {   api_key
          , api_base
          , defaults
          , http_client
        });
        Ok(())
    }

    fn close(&mut self)
    {   if self.state.close().is_some()
        {   debug!("Mistral client closed");
        }
    }

    fn get_generation_url(&self) -> String
    {   let base = match &self.state
        {   ClientState::Connected(config) => config.api_base.as_str()
          , _ => MISTRAL_API_BASE
        };
        endpoint(base, "chat/completions")
    }

    fn supports_batch_inference(&self) -> bool
    {   false
    }

    fn supports_choice_logits(&self) -> bool
    {   false
    }

    fn get_generation_header(&self) -> BTreeMap<String, String>
    {   let mut header = BTreeMap::new();
        if let ClientState::Connected(config) = &self.state
        {   header.insert(
              "Authorization".to_string(),
              format!("Bearer {}", config.api_key)
            );
        }
        header
    }

    fn get_model_params(&self) -> ModelParams
    {   let model = match &self.state
        {   ClientState::Connected(config) => config.defaults
              .get("model")
              .cloned()
              .unwrap_or_else(|| Value::from("mistral-small-latest"))
          , _ => MISTRAL_PARAMS
              .get("model")
              .map(|s| s.default.to_value())
              .unwrap_or(Value::Null)
        };
        let mut params = ModelParams::new();
        params.insert("model".to_string(), model);
        params
    }

    fn get_request(&self, request: &Request) -> Result<BuiltRequest>
    {   let config = self.state.connected()?;
        if let Prompt::Batch(_) = request.prompt
        {   return Err(Error::invalid(
              "Mistral does not support batch prompts; \
               issue one request per prompt"
            ));
        }

        let params = MISTRAL_PARAMS.normalize(request, &config.defaults)?;
        let body = MistralChatRequest::from_params(&params)?;
        trace!("Mistral request: {:?}", body);

        let expected = body.n;
        let url = self.get_generation_url();
        let header = self.get_generation_header();
        let http_client = config.http_client.clone();

        let deferred = DeferredResult::new(expected, move || async move {
          let response: MistralChatResponse
            = post_json(&http_client, &url, &header, &body).await?;
          Ok::<_, Error>(RawResponse::from(response))
        });
        Ok((deferred, params))
    }

    fn get_choice_logit_request(
      &self
    , _gold_choices: &[String]
    , _request: &Request
    ) -> Result<BuiltRequest>
    {   self.state.connected()?;
        Err(Error::Unsupported(
          "Mistral does not expose choice log-likelihoods".to_string()
        ))
    }
}
