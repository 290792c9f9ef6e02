use promptkit::providers::DummyClient;
use promptkit::{
  Client, ClientArgs, ClientBackend, ClientConfig, ClientKind, Error,
  ErrorKind, Request, Session,
};
use serde_json::json;

fn init()
{   promptkit::init_logging();
}

fn connected_dummy() -> DummyClient
{   let mut client = DummyClient::new();
    client.connect(None, &mut ClientArgs::new()).unwrap();
    client
}

fn gold(choices: &[&str]) -> Vec<String>
{   choices.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_dummy_scalar_prompt_yields_n_choices()
{   init();
    let client = connected_dummy();
    let request = Request::new("hi").with_param("n", 2);

    let (deferred, params) = client.get_request(&request).unwrap();
    assert_eq!(params.get("num_results"), Some(&json!(2)));
    assert_eq!(params.get("prompt"), Some(&json!("hi")));

    let response = deferred.invoke().await.unwrap();
    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      json!({"choices": [{"text": "hello"}, {"text": "hello"}]})
    );
}

#[tokio::test]
async fn test_dummy_batch_prompt_yields_k_times_n_choices()
{   let client = connected_dummy();
    let request = Request::new(vec!["a", "b", "c"]).with_param("n", 2);

    let (deferred, _) = client.get_request(&request).unwrap();
    assert_eq!(deferred.expected_choices(), 6);
    let response = deferred.invoke().await.unwrap();
    assert_eq!(response.choices.len(), 6);
}

#[test]
fn test_dummy_default_n_is_one()
{   let client = connected_dummy();
    let (deferred, params) = client
      .get_request(&Request::new("hi"))
      .unwrap();
    assert_eq!(params.get("num_results"), Some(&json!(1)));

    let response = tokio_test::block_on(deferred.invoke()).unwrap();
    assert_eq!(response.texts(), vec!["hello"]);
}

#[test]
fn test_connect_pops_recognized_args()
{   let mut args = ClientArgs::new();
    args.insert("n".into(), json!(3));
    args.insert("unrelated".into(), json!(true));

    let mut client = DummyClient::new();
    client.connect(None, &mut args).unwrap();

    assert!(!args.contains_key("n"));
    assert!(args.contains_key("unrelated"));

    let (deferred, params) = client
      .get_request(&Request::new("hi"))
      .unwrap();
    assert_eq!(params.get("num_results"), Some(&json!(3)));
    assert_eq!(deferred.expected_choices(), 3);
}

#[test]
fn test_request_params_are_deterministic()
{   let client = connected_dummy();
    let request = Request::new(vec!["a", "b"])
      .with_param("n", 2)
      .with_param("ignored", "x");

    let (_, first) = client.get_request(&request).unwrap();
    let (_, second) = client.get_request(&request).unwrap();
    assert_eq!(first, second);

    let model = client.get_model_params();
    assert_eq!(
      first.cache_key("dummy", &model).unwrap(),
      second.cache_key("dummy", &model).unwrap()
    );
}

#[tokio::test]
async fn test_dummy_choice_logits_scalar_prompt()
{   let client = connected_dummy();
    let choices = gold(&["yes", "no"]);

    let (deferred, params) = client
      .get_choice_logit_request(&choices, &Request::new("is it?"))
      .unwrap();
    assert_eq!(
      serde_json::to_value(&params).unwrap(),
      json!({"prompt": "is it?", "gold_choices": ["yes", "no"]})
    );

    let response = deferred.invoke().await.unwrap();
    assert_eq!(response.choices.len(), 1);
    assert!(choices.contains(&response.choices[0].text));
}

#[tokio::test]
async fn test_dummy_choice_logits_batch_prompt()
{   let client = connected_dummy();
    let (deferred, _) = client
      .get_choice_logit_request(
        &gold(&["yes", "no"]),
        &Request::new(vec!["a", "b"])
      )
      .unwrap();

    let response = deferred.invoke().await.unwrap();
    assert_eq!(response.texts(), vec!["yes", "yes"]);
}

#[test]
fn test_choice_logits_ignore_generation_params()
{   let client = connected_dummy();
    let (_, params) = client
      .get_choice_logit_request(
        &gold(&["yes"]),
        &Request::new("q").with_param("n", 4)
      )
      .unwrap();
    assert!(params.get("num_results").is_none());
    assert_eq!(params.len(), 2);
}

#[test]
fn test_empty_gold_choices_rejected()
{   let client = connected_dummy();
    let err = client
      .get_choice_logit_request(&[], &Request::new("q"))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_empty_batch_rejected()
{   let client = connected_dummy();
    let request = Request::new(Vec::<String>::new());
    let err = client.get_request(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_zero_n_rejected()
{   let client = connected_dummy();
    let err = client
      .get_request(&Request::new("hi").with_param("n", 0))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_request_before_connect_fails()
{   let client = DummyClient::new();
    assert_eq!(
      client.get_request(&Request::new("hi")).unwrap_err(),
      Error::NotConnected
    );
    assert_eq!(
      client
        .get_choice_logit_request(&gold(&["a"]), &Request::new("hi"))
        .unwrap_err(),
      Error::NotConnected
    );
}

#[test]
fn test_request_after_close_fails()
{   let mut client = connected_dummy();
    client.close();
    assert_eq!(
      client.get_request(&Request::new("hi")).unwrap_err(),
      Error::NotConnected
    );

    // close is terminal and repeatable
    client.close();
    let err = client.connect(None, &mut ClientArgs::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_close_on_never_connected_client()
{   let mut client = DummyClient::new();
    client.close();
    assert_eq!(
      client.get_request(&Request::new("hi")).unwrap_err(),
      Error::NotConnected
    );
}

#[test]
fn test_connect_twice_fails()
{   let mut client = connected_dummy();
    let err = client.connect(None, &mut ClientArgs::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_dummy_metadata()
{   let client = connected_dummy();
    assert_eq!(client.get_generation_url(), "dummy");
    assert!(client.supports_batch_inference());
    assert!(client.supports_choice_logits());
    assert!(client.get_generation_header().is_empty());
    assert_eq!(client.get_model_params()["engine"], json!("dummy"));
}

#[tokio::test]
async fn test_session_caches_by_params()
{   init();
    let client = ClientConfig::new(ClientKind::Dummy).connect().unwrap();
    let mut session = Session::new(client);

    let request = Request::new("hi").with_param("n", 2);
    let first = session.run(&request).await.unwrap();
    let second = session.run(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(session.cache().len(), 1);

    session.run(&request.clone().with_param("n", 3)).await.unwrap();
    assert_eq!(session.cache().len(), 2);

    // same request, equivalent numeric spelling
    session.run(&Request::new("hi").with_param("n", 2.0)).await.unwrap();
    assert_eq!(session.cache().len(), 2);

    let cache = session.close();
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_session_choice_requests_are_cached_separately()
{   let client = ClientConfig::new(ClientKind::Dummy).connect().unwrap();
    let mut session = Session::new(client);
    let request = Request::new("q");

    session.run(&request).await.unwrap();
    let picked = session
      .run_choice(&gold(&["yes", "no"]), &request)
      .await
      .unwrap();
    assert_eq!(picked.texts(), vec!["yes"]);
    assert_eq!(session.cache().len(), 2);
}

#[test]
fn test_config_from_json()
{   init();
    let config = ClientConfig::from_json_str(
      r#"{"client": "dummy", "client_args": {"n": 4, "bogus": 1}}"#
    ).unwrap();
    assert_eq!(config.client, ClientKind::Dummy);

    let client = config.connect().unwrap();
    let (deferred, _) = client.get_request(&Request::new("x")).unwrap();
    assert_eq!(deferred.expected_choices(), 4);
}

#[test]
fn test_config_rejects_unknown_client()
{   let err = ClientConfig::from_json_str(r#"{"client": "nope"}"#)
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_client_kind_parse()
{   for kind in [ClientKind::Dummy, ClientKind::Mistral, ClientKind::ModelServer]
    {   assert_eq!(kind.as_str().parse::<ClientKind>().unwrap(), kind);
    }
    assert!("gpt".parse::<ClientKind>().is_err());
}

#[tokio::test]
async fn test_backend_initialization()
{   let backend = ClientBackend::spawn(Box::new(connected_dummy()));
    let description = backend.describe().await.unwrap();
    assert_eq!(description.generation_url, "dummy");
    assert!(description.supports_batch_inference);
    assert_eq!(description.model_params["engine"], json!("dummy"));

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_backend_builds_requests_from_many_tasks()
{   let backend = std::sync::Arc::new(
      ClientBackend::spawn(Box::new(connected_dummy()))
    );

    let mut handles = Vec::new();
    for i in 1..=4_u64
    {   let backend = backend.clone();
        handles.push(tokio::spawn(async move {
          let request = Request::new("hi").with_param("n", i);
          let (deferred, _) = backend.get_request(request).await.unwrap();
          deferred.invoke().await.unwrap().choices.len()
        }));
    }

    let mut counts = Vec::new();
    for handle in handles
    {   counts.push(handle.await.unwrap());
    }
    assert_eq!(counts, vec![1, 2, 3, 4]);

    let (deferred, _) = backend
      .get_choice_logit_request(gold(&["no", "yes"]), Request::new("q"))
      .await
      .unwrap();
    assert_eq!(deferred.invoke().await.unwrap().texts(), vec!["no"]);
}

#[tokio::test]
async fn test_backend_reports_not_connected()
{   let backend = ClientBackend::spawn(Box::new(DummyClient::new()));
    let err = backend.get_request(Request::new("hi")).await.unwrap_err();
    assert_eq!(err, Error::NotConnected);
    backend.close().await.unwrap();
}

#[test]
fn test_parameter_tables_have_unique_keys()
{   use promptkit::providers::{dummy, mistral, model_server};
    assert!(dummy::DUMMY_PARAMS.has_unique_keys());
    assert!(mistral::MISTRAL_PARAMS.has_unique_keys());
    assert!(model_server::MODEL_SERVER_PARAMS.has_unique_keys());
}

#[test]
fn test_oversized_n_rejected_without_panic()
{   let client = connected_dummy();
    let request = Request::new(vec!["a", "b", "c"])
      .with_param("n", i64::MAX);
    let err = client.get_request(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let request = Request::new("a")
      .with_param("n", promptkit::params::MAX_TOTAL_CHOICES as u64 + 1);
    let err = client.get_request(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_init_logging_is_repeatable()
{   init();
    promptkit::init_logging();
    log::info!("logging initialized twice");
}
