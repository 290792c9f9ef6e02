use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::client::{choice_logit_params, BuiltRequest, Client, ClientState};
use crate::deferred::DeferredResult;
use crate::error::{Error, Result};
use crate::params::{
  ClientArgs, GenerationDefaults, ModelParams, ParamDefault, ParamSpec,
  ParameterMap,
};
use crate::request::{RawResponse, Request};

/// User param -> (client param, default)
pub const DUMMY_PARAMS: ParameterMap = ParameterMap(&[
  ParamSpec::new("n", "num_results", ParamDefault::Int(1))
]);

/// Text every generation request answers with
pub const DUMMY_COMPLETION: &str = "hello";

/// Identity test backend. Performs no I/O.
#[derive(Debug, Default)]
pub struct DummyClient
{   state: ClientState<GenerationDefaults>
}

impl DummyClient
{   pub fn new() -> Self
    {   DummyClient::default()
    }
}

impl Client for DummyClient
{   fn connect(
      &mut self
    , _connection_str: Option<&str>
    , client_args: &mut ClientArgs
    ) -> Result<()>
    {   self.state.ensure_uninitialized()?;
        let defaults = DUMMY_PARAMS.take_client_args(client_args)?;
        debug!("Dummy client connected");
        self.state = ClientState::Connected(defaults);
        Ok(())
    }

    fn close(&mut self)
    {   self.state.close();
    }

    fn get_generation_url(&self) -> String
    {   "dummy".to_string()
    }

    fn supports_batch_inference(&self) -> bool
    {   true
    }

    fn get_generation_header(&self) -> BTreeMap<String, String>
    {   BTreeMap::new()
    }

    fn get_model_params(&self) -> ModelParams
    {   let mut params = ModelParams::new();
        params.insert("engine".to_string(), Value::from("dummy"));
        params
    }

    fn get_request(&self, request: &Request) -> Result<BuiltRequest>
    {   let defaults = self.state.connected()?;
        let num_results = request.num_results()?;
        let params = DUMMY_PARAMS.normalize(request, defaults)?;
        let total = params.total_choices("num_results", num_results)?;

        let deferred = DeferredResult::new(total, move || async move {
          Ok::<_, Error>(RawResponse::repeat(DUMMY_COMPLETION, total))
        });
        Ok((deferred, params))
    }

    /// Always picks the first gold choice
    fn get_choice_logit_request(
      &self
    , gold_choices: &[String]
    , request: &Request
    ) -> Result<BuiltRequest>
    {   self.state.connected()?;
        let (num_results, params)
          = choice_logit_params(gold_choices, request)?;
        let choice = gold_choices[0].clone();

        let deferred = DeferredResult::new(num_results, move || async move {
          Ok::<_, Error>(RawResponse::repeat(&choice, num_results))
        });
        Ok((deferred, params))
    }
}
