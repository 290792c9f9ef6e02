use log::{debug, error, info};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::client::{BuiltRequest, Client};
use crate::error::{Error, Result};
use crate::params::ModelParams;
use crate::request::Request;

pub type BuildReply = Result<BuiltRequest>;
pub type BuildReplySender
  = mpsc::UnboundedSender<BuildReply>;

/// Snapshot of a client's identity and capabilities
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDescription
{   pub generation_url: String
  , pub supports_batch_inference: bool
  , pub supports_choice_logits: bool
  , pub generation_header: BTreeMap<String, String>
  , pub model_params: ModelParams
}

/// Union of all possible handler commands to execute
pub enum HandlerCommand
{   GetRequest
    {   request: Request
      , reply: BuildReplySender
    }
  , GetChoiceLogitRequest
    {   gold_choices: Vec<String>
      , request: Request
      , reply: BuildReplySender
    }
  , Describe
    {   reply: mpsc::UnboundedSender<ClientDescription>
    }
  , Close
    {   reply: mpsc::UnboundedSender<()>
    }
}

/// Owns one connected client on a background task.
///
/// A single instance is not safe for concurrent request building, so
/// every caller goes through the command channel and the task handles
/// one command at a time. Deferred calls come back to the caller and
/// run outside the task.
pub struct ClientBackend
{   tx: mpsc::UnboundedSender<HandlerCommand>
  , _task_handle: tokio::task::JoinHandle<()>
}

impl ClientBackend
{   /// Spawn the task. Returns immediately.
    pub fn spawn(client: Box<dyn Client>) -> Self
    {   debug!(
          "Spawning ClientBackend for {}",
          client.get_generation_url()
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(rx, client).await
        });

        ClientBackend
        {   tx
          , _task_handle
        }
    }

    fn send(&self, cmd: HandlerCommand) -> Result<()>
    {   self.tx.send(cmd).map_err(|_| {
          error!("Backend channel closed");
          Error::NotConnected
        })
    }

    pub async fn get_request(
      &self
    , request: Request
    ) -> Result<BuiltRequest>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.send(HandlerCommand::GetRequest { request, reply })?;
        reply_rx.recv().await.unwrap_or(Err(Error::NotConnected))
    }

    pub async fn get_choice_logit_request(
      &self
    , gold_choices: Vec<String>
    , request: Request
    ) -> Result<BuiltRequest>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.send(HandlerCommand::GetChoiceLogitRequest {
          gold_choices,
          request,
          reply,
        })?;
        reply_rx.recv().await.unwrap_or(Err(Error::NotConnected))
    }

    pub async fn describe(&self) -> Result<ClientDescription>
    {   let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.send(HandlerCommand::Describe { reply })?;
        reply_rx.recv().await.ok_or(Error::NotConnected)
    }

    /// Close the client and stop the task
    pub async fn close(self) -> Result<()>
    {   debug!("Shutting down ClientBackend");
        let (reply, mut reply_rx) = mpsc::unbounded_channel();
        self.send(HandlerCommand::Close { reply })?;

        if reply_rx.recv().await.is_some()
        {   debug!("Backend shutdown confirmed");
            Ok(())
        } else
        {   error!("Backend exited before confirming shutdown");
            Err(Error::NotConnected)
        }
    }
}

/// Main backend event loop
async fn run_backend_loop(
  mut rx: mpsc::UnboundedReceiver<HandlerCommand>
, mut client: Box<dyn Client>
)
{   debug!("Starting ClientBackend event loop");
    loop
    { match rx.recv().await
      {   Some(HandlerCommand::GetRequest { request, reply }) => {
            debug!("Processing GetRequest");
            let _ = reply.send(client.get_request(&request));
          }
        , Some(HandlerCommand::GetChoiceLogitRequest {
            gold_choices, request, reply
          }) => {
            debug!("Processing GetChoiceLogitRequest");
            let _ = reply.send(
              client.get_choice_logit_request(&gold_choices, &request)
            );
          }
        , Some(HandlerCommand::Describe { reply }) => {
            let _ = reply.send(ClientDescription
            {   generation_url: client.get_generation_url()
              , supports_batch_inference: client.supports_batch_inference()
              , supports_choice_logits: client.supports_choice_logits()
              , generation_header: client.get_generation_header()
              , model_params: client.get_model_params()
            });
          }
        , Some(HandlerCommand::Close { reply }) => {
            client.close();
            let _ = reply.send(());
            info!("ClientBackend shutting down");
            break;
          }
        , None => {
            debug!("Command channel closed");
            client.close();
            break;
          }
      }
    }
}
