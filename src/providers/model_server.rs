use log::{debug, error};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::{choice_logit_params, BuiltRequest, Client, ClientState};
use crate::deferred::DeferredResult;
use crate::error::{Error, Result};
use crate::params::{
  ClientArgs, GenerationDefaults, ModelParams, ParamDefault, ParamSpec,
  ParameterMap,
};
use crate::providers::http::{endpoint, post_json};
use crate::request::{RawResponse, Request};

const DEFAULT_MODEL_NAME: &str = "local-model";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// User param -> (client param, default)
pub const MODEL_SERVER_PARAMS: ParameterMap = ParameterMap(&[
  ParamSpec::new("n", "n", ParamDefault::Int(1))
, ParamSpec::new("temperature", "temperature", ParamDefault::Float(1.0))
, ParamSpec::new("max_tokens", "max_tokens", ParamDefault::Int(10))
, ParamSpec::new("top_p", "top_p", ParamDefault::Float(1.0))
, ParamSpec::new("top_k", "top_k", ParamDefault::Int(50))
, ParamSpec::new(
    "repetition_penalty", "repetition_penalty", ParamDefault::Float(1.0)
  )
, ParamSpec::new("do_sample", "do_sample", ParamDefault::Bool(true))
]);

#[derive(Debug, Clone)]
pub struct ModelServerConfig
{   base_url: String
  , model_name: String
  , defaults: GenerationDefaults
  , http_client: reqwest::Client
}

/// Self-hosted model server speaking the raw response shape directly.
///
/// `POST /completions` takes the normalized params (prompt may be a
/// list). `POST /choice_logits` takes `{prompt, gold_choices}` and
/// answers with the maximum log-likelihood choice per prompt.
#[derive(Debug, Default)]
pub struct ModelServerClient
{   state: ClientState<ModelServerConfig>
}

impl ModelServerClient
{   pub fn new() -> Self
    {   debug!("Creating ModelServerClient");
        ModelServerClient::default()
    }

    fn parse_base_url(connection_str: Option<&str>) -> Result<String>
    {   let raw = connection_str.ok_or_else(|| {
          Error::ConnectionError(
            "model server needs a base URL connection string".to_string()
          )
        })?;
        let url = reqwest::Url::parse(raw).map_err(|e| {
          error!("Bad model server URL {}: {}", raw, e);
          Error::ConnectionError(format!("invalid URL '{}': {}", raw, e))
        })?;
        match url.scheme()
        {   "http" | "https" => Ok(raw.trim_end_matches('/').to_string())
          , other => Err(Error::ConnectionError(
              format!("unsupported URL scheme: {}", other)
            ))
        }
    }
}

impl Client for ModelServerClient
{   fn connect(
      &mut self
    , connection_str: Option<&str>
    , client_args: &mut ClientArgs
    ) -> Result<()>
    {   self.state.ensure_uninitialized()?;
        let base_url = Self::parse_base_url(connection_str)?;

        let model_name = match client_args.remove("model_name")
        {   Some(Value::String(name)) if !name.is_empty() => name
          , None | Some(Value::Null) => DEFAULT_MODEL_NAME.to_string()
          , Some(other) => {
              return Err(Error::ConnectionError(
                format!("model_name must be a non-empty string, got {}", other)
              ));
            }
        };
        let defaults = MODEL_SERVER_PARAMS.take_client_args(client_args)?;

        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
          .build()
          .map_err(|e| Error::ConnectionError(e.to_string()))?;

        debug!("Model server client connected to {}", base_url);
        self.state = ClientState::Connected(ModelServerConfig
        {   base_url
          , model_name
          , defaults
          , http_client
        });
        Ok(())
    }

    fn close(&mut self)
    {   if self.state.close().is_some()
        {   debug!("Model server client closed");
        }
    }

    fn get_generation_url(&self) -> String
    {   match &self.state
        {   ClientState::Connected(config) => {
              endpoint(&config.base_url, "completions")
            }
          , _ => "model_server".to_string()
        }
    }

    fn supports_batch_inference(&self) -> bool
    {   true
    }

    fn get_generation_header(&self) -> BTreeMap<String, String>
    {   BTreeMap::new()
    }

    fn get_model_params(&self) -> ModelParams
    {   let name = match &self.state
        {   ClientState::Connected(config) => config.model_name.clone()
          , _ => DEFAULT_MODEL_NAME.to_string()
        };
        let mut params = ModelParams::new();
        params.insert("model_name".to_string(), Value::from(name));
        params
    }

    fn get_request(&self, request: &Request) -> Result<BuiltRequest>
    {   let config = self.state.connected()?;
        let num_results = request.num_results()?;
        let params = MODEL_SERVER_PARAMS.normalize(request, &config.defaults)?;
        let expected = params.total_choices("n", num_results)?;

        let url = self.get_generation_url();
        let http_client = config.http_client.clone();
        let body = params.clone();

        let deferred = DeferredResult::new(expected, move || async move {
          post_json::<_, RawResponse>(
            &http_client, &url, &BTreeMap::new(), &body
          ).await
        });
        Ok((deferred, params))
    }

    /// Selection happens server side; every returned choice must be
    /// one of `gold_choices`.
    fn get_choice_logit_request(
      &self
    , gold_choices: &[String]
    , request: &Request
    ) -> Result<BuiltRequest>
    {   let config = self.state.connected()?;
        let (num_results, params)
          = choice_logit_params(gold_choices, request)?;

        let url = endpoint(&config.base_url, "choice_logits");
        let http_client = config.http_client.clone();
        let body = params.clone();
        let gold = gold_choices.to_vec();

        let deferred = DeferredResult::new(num_results, move || async move {
          let response: RawResponse
            = post_json(&http_client, &url, &BTreeMap::new(), &body).await?;
          if let Some(bad) = response.choices
            .iter()
            .find(|c| !gold.contains(&c.text))
          {   error!("Server chose a non-gold choice: {}", bad.text);
              return Err(Error::BackendError(
                format!("choice '{}' is not a gold choice", bad.text)
              ));
          }
          Ok::<_, Error>(response)
        });
        Ok((deferred, params))
    }
}
