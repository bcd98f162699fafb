use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lambda_http::http::header::CONTENT_TYPE;
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Request, Response};

use slack_command_core::{
    sign, App, BoxError, CommandRegistry, DeliveryError, DispatchMode, HandlerResult,
    RegistryError, ResponsePoster, SlackAction, SlackCommand, SlackResponse, TaskError,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use tokio::sync::mpsc;

const SECRET: &str = "e2e-signing-secret";
const PING_BODY: &str = "token=t&command=%2Fping&text=&response_url=http://x&user_id=U1";

#[derive(Default)]
struct RecordingPoster {
    posts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ResponsePoster for RecordingPoster {
    async fn post_json(&self, url: &str, body: String) -> Result<(), DeliveryError> {
        self.posts.lock().unwrap().push((url.to_string(), body));
        Ok(())
    }
}

/// Fails every POST the way an unreachable response URL would.
struct FailingPoster;

#[async_trait]
impl ResponsePoster for FailingPoster {
    async fn post_json(&self, url: &str, _body: String) -> Result<(), DeliveryError> {
        let err = reqwest::Client::new()
            .post(format!("not a url {url}"))
            .build()
            .unwrap_err();
        Err(DeliveryError::Http(err))
    }
}

fn request_at(path: &str, body: &str, age_secs: i64) -> Request {
    let timestamp = (chrono::Utc::now().timestamp() - age_secs).to_string();
    let signature = sign(SECRET, &timestamp, body.as_bytes());
    lambda_http::http::Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed(path: &str, body: &str) -> Request {
    request_at(path, body, 0)
}

fn body_text(response: &Response<Body>) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

/// An app whose `/ping` handler reports every invocation it sees.
fn ping_app(mode: DispatchMode) -> (App, mpsc::UnboundedReceiver<SlackCommand>, Arc<RecordingPoster>) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let poster = Arc::new(RecordingPoster::default());

    let mut app = App::new(SECRET, "/slack")
        .with_mode(mode)
        .with_poster(Arc::clone(&poster));
    app.register_command("/ping", move |command: SlackCommand| {
        let seen_tx = seen_tx.clone();
        async move {
            seen_tx.send(command).ok();
            HandlerResult::Ok(Some(SlackResponse::text("ok")))
        }
    })
    .unwrap();

    (app, seen_rx, poster)
}

#[tokio::test]
async fn deferred_ping_acks_then_posts_to_response_url() {
    let (app, mut seen, poster) = ping_app(DispatchMode::Deferred);

    let dispatched = app.dispatch(signed("/slack", PING_BODY)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    assert!(dispatched.response.body().is_empty());

    dispatched.task.expect("handler task").await.unwrap().unwrap();

    let command = seen.recv().await.unwrap();
    assert_eq!(command.command, "/ping");
    assert_eq!(command.user_id, "U1");
    assert_eq!(command.response_url, "http://x");

    let posts = poster.posts.lock().unwrap();
    assert_eq!(*posts, vec![("http://x".to_string(), r#"{"text":"ok"}"#.to_string())]);
}

#[tokio::test]
async fn inline_ping_answers_in_the_body() {
    let (app, mut seen, poster) = ping_app(DispatchMode::Inline);

    let response = app.handle(signed("/slack", PING_BODY)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(body_text(&response), r#"{"text":"ok"}"#);

    assert_eq!(seen.recv().await.unwrap().command, "/ping");
    assert!(poster.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stale_request_is_rejected_even_when_correctly_signed() {
    let (app, mut seen, poster) = ping_app(DispatchMode::Deferred);

    let dispatched = app.dispatch(request_at("/slack", PING_BODY, 301)).await;
    assert_eq!(dispatched.response.status(), StatusCode::BAD_REQUEST);
    assert!(dispatched.response.body().is_empty());
    assert!(dispatched.task.is_none());

    assert!(seen.try_recv().is_err());
    assert!(poster.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_signature_and_missing_headers_are_rejected() {
    let (app, mut seen, _poster) = ping_app(DispatchMode::Inline);

    let mut forged = signed("/slack", PING_BODY);
    forged
        .headers_mut()
        .insert(SIGNATURE_HEADER, "v0=deadbeef".parse().unwrap());
    let response = app.handle(forged).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.body().is_empty());

    let bare = lambda_http::http::Request::builder()
        .method(Method::POST)
        .uri("/slack")
        .body(Body::from(PING_BODY))
        .unwrap();
    assert_eq!(app.handle(bare).await.status(), StatusCode::BAD_REQUEST);

    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn unmatched_command_is_silently_acknowledged() {
    for mode in [DispatchMode::Inline, DispatchMode::Deferred] {
        let (app, mut seen, poster) = ping_app(mode);

        let dispatched = app
            .dispatch(signed("/slack", "command=%2Funknown&response_url=http://x"))
            .await;
        assert_eq!(dispatched.response.status(), StatusCode::OK);
        assert!(dispatched.response.body().is_empty());
        assert!(dispatched.task.is_none());

        assert!(seen.try_recv().is_err());
        assert!(poster.posts.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn silent_handler_posts_nothing() {
    let poster = Arc::new(RecordingPoster::default());
    let mut app = App::new(SECRET, "/slack").with_poster(Arc::clone(&poster));
    app.register_command("/quiet", |_command: SlackCommand| async {
        HandlerResult::Ok(None)
    })
    .unwrap();

    let dispatched = app
        .dispatch(signed("/slack", "command=%2Fquiet&response_url=http://x"))
        .await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    dispatched.task.unwrap().await.unwrap().unwrap();

    assert!(poster.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn later_command_registration_wins() {
    let mut app = App::new(SECRET, "/slack").with_mode(DispatchMode::Inline);
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Ok(Some(SlackResponse::text("first")))
    })
    .unwrap();
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Ok(Some(SlackResponse::text("second")))
    })
    .unwrap();

    let response = app.handle(signed("/slack", "command=%2Fping")).await;
    assert_eq!(body_text(&response), r#"{"text":"second"}"#);
}

fn action_app() -> (App, mpsc::UnboundedReceiver<SlackAction>) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let mut app = App::new(SECRET, "/slack");
    app.register_action("approve", "approve", move |action: SlackAction| {
        let seen_tx = seen_tx.clone();
        async move {
            seen_tx.send(action).ok();
            Ok::<(), BoxError>(())
        }
    })
    .unwrap();
    (app, seen_rx)
}

#[tokio::test]
async fn action_endpoint_runs_handler_after_ack() {
    let (app, mut seen) = action_app();
    let payload = r#"{"type":"interactive_message","callback_id":"approve","actions":[{"name":"decision","type":"button","value":"yes"}],"user":{"id":"U7","name":"kim"},"response_url":"https://hooks.example.com/actions/1"}"#;

    let dispatched = app.dispatch(signed("/slack/approve", payload)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    assert!(dispatched.response.body().is_empty());
    dispatched.task.unwrap().await.unwrap().unwrap();

    let action = seen.recv().await.unwrap();
    assert_eq!(action.callback_id, "approve");
    assert_eq!(action.user.id, "U7");
    assert_eq!(action.actions[0].value, "yes");
}

#[tokio::test]
async fn action_endpoint_accepts_payload_form() {
    let (app, mut seen) = action_app();
    let body = "payload=%7B%22callback_id%22%3A%22approve%22%7D";

    let dispatched = app.dispatch(signed("/slack/approve", body)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    dispatched.task.unwrap().await.unwrap().unwrap();

    assert_eq!(seen.recv().await.unwrap().callback_id, "approve");
}

#[tokio::test]
async fn action_endpoint_failures() {
    let (app, mut seen) = action_app();

    let response = app.handle(signed("/slack/approve", "{broken")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body().is_empty());

    let stale = request_at("/slack/approve", r#"{"callback_id":"approve"}"#, 600);
    assert_eq!(app.handle(stale).await.status(), StatusCode::BAD_REQUEST);

    let response = app
        .handle(signed("/slack/missing", r#"{"callback_id":"approve"}"#))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn action_capacity_is_enforced_at_registration() {
    let mut app = App::new(SECRET, "/slack");
    for i in 0..5 {
        app.register_action(format!("cb{i}"), format!("a{i}"), |_a: SlackAction| async {
            Ok::<(), BoxError>(())
        })
        .unwrap();
    }

    let err = app
        .register_action("cb5", "a5", |_a: SlackAction| async { Ok::<(), BoxError>(()) })
        .unwrap_err();
    assert_eq!(err.to_string(), "cannot add another entry (exceeded limit of 5)");

    // The fifth action is still served at its own path.
    let dispatched = app.dispatch(signed("/slack/a4", r#"{"callback_id":"cb4"}"#)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    assert!(dispatched.task.is_some());
}

#[tokio::test]
async fn deferred_delivery_failure_is_reported_on_the_task() {
    let mut app = App::new(SECRET, "/slack").with_poster(FailingPoster);
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Ok(Some(SlackResponse::text("ok")))
    })
    .unwrap();

    let dispatched = app.dispatch(signed("/slack", PING_BODY)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);
    assert!(dispatched.response.body().is_empty());

    let outcome = dispatched.task.unwrap().await.unwrap();
    assert!(matches!(outcome, Err(TaskError::Delivery(DeliveryError::Http(_)))));
}

#[tokio::test]
async fn deferred_handler_error_posts_nothing() {
    let poster = Arc::new(RecordingPoster::default());
    let mut app = App::new(SECRET, "/slack").with_poster(Arc::clone(&poster));
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Err("upstream down".into())
    })
    .unwrap();

    let dispatched = app.dispatch(signed("/slack", PING_BODY)).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);

    match dispatched.task.unwrap().await.unwrap() {
        Err(TaskError::Handler(err)) => assert_eq!(err.to_string(), "upstream down"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(poster.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deferred_reply_without_response_url_is_a_delivery_error() {
    let (app, mut seen, poster) = ping_app(DispatchMode::Deferred);

    let dispatched = app.dispatch(signed("/slack", "command=%2Fping&user_id=U1")).await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);

    let outcome = dispatched.task.unwrap().await.unwrap();
    assert!(matches!(
        outcome,
        Err(TaskError::Delivery(DeliveryError::MissingResponseUrl))
    ));
    assert_eq!(seen.recv().await.unwrap().response_url, "");
    assert!(poster.posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn action_handler_deadline_is_enforced() {
    let mut app = App::new(SECRET, "/slack").with_handler_timeout(Duration::from_millis(20));
    app.register_action("approve", "approve", |_a: SlackAction| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<(), BoxError>(())
    })
    .unwrap();

    let dispatched = app
        .dispatch(signed("/slack/approve", r#"{"callback_id":"approve"}"#))
        .await;
    assert_eq!(dispatched.response.status(), StatusCode::OK);

    let outcome = dispatched.task.unwrap().await.unwrap();
    assert!(matches!(outcome, Err(TaskError::TimedOut(limit)) if limit == Duration::from_millis(20)));
}

#[tokio::test]
async fn bounded_command_registry_limits_the_app() {
    let mut app = App::new(SECRET, "/slack")
        .with_mode(DispatchMode::Inline)
        .with_commands(CommandRegistry::bounded(1));
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Ok(Some(SlackResponse::text("pong")))
    })
    .unwrap();

    let err = app
        .register_command("/echo", |_c: SlackCommand| async { HandlerResult::Ok(None) })
        .unwrap_err();
    assert_eq!(err, RegistryError::CapacityExceeded { capacity: 1 });

    // Replacing the registered name still works when full.
    app.register_command("/ping", |_c: SlackCommand| async {
        HandlerResult::Ok(Some(SlackResponse::text("pong again")))
    })
    .unwrap();

    let response = app.handle(signed("/slack", "command=%2Fping")).await;
    assert_eq!(body_text(&response), r#"{"text":"pong again"}"#);

    let response = app.handle(signed("/slack", "command=%2Fecho")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().is_empty());
}
