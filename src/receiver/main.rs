use std::sync::Arc;

use lambda_http::{run, service_fn, Error, Request};
use slack_command_core::{App, CommandRegistry, HttpPoster};
use tracing::info;

mod config;
mod handlers;

use config::Config;

fn build_app(config: &Config) -> Result<App, Error> {
    let mut app = App::new(config.signing_secret.clone(), config.endpoint.clone())
        .with_mode(config.mode)
        .with_poster(HttpPoster::new(config.post_timeout)?);
    if let Some(timeout) = config.handler_timeout {
        app = app.with_handler_timeout(timeout);
    }
    if let Some(limit) = config.max_commands {
        app = app.with_commands(CommandRegistry::bounded(limit));
    }

    app.register_command("/ping", handlers::ping)?;
    app.register_command("/echo", handlers::echo)?;
    app.register_action("approve", "approve", handlers::approve)?;

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    // Registration is complete here; the app is read-only while serving.
    let app = Arc::new(build_app(&config)?);
    info!(endpoint = %app.endpoint(), mode = ?app.mode(), "slack command receiver ready");

    run(service_fn(move |event: Request| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Error>(app.handle(event).await) }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::{Method, StatusCode};
    use lambda_http::Body;
    use slack_command_core::{sign, DispatchMode, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    fn config() -> Config {
        Config {
            signing_secret: "receiver-secret".to_string(),
            endpoint: "/slack".to_string(),
            mode: DispatchMode::Inline,
            max_commands: None,
            handler_timeout: Some(std::time::Duration::from_secs(1)),
            post_timeout: std::time::Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn wired_ping_answers_pong() {
        let app = build_app(&config()).unwrap();
        let body = "command=%2Fping&user_id=U1";
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let request = lambda_http::http::Request::builder()
            .method(Method::POST)
            .uri("/slack")
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(SIGNATURE_HEADER, sign("receiver-secret", &timestamp, body.as_bytes()))
            .body(Body::from(body))
            .unwrap();

        let response = app.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            String::from_utf8(response.body().to_vec()).unwrap(),
            r#"{"text":"pong","response_type":"ephemeral"}"#
        );
    }

    #[test]
    fn command_limit_from_config_is_enforced() {
        let limited = Config {
            max_commands: Some(1),
            ..config()
        };
        let err = build_app(&limited).unwrap_err();
        assert_eq!(err.to_string(), "cannot add another entry (exceeded limit of 1)");

        let roomy = Config {
            max_commands: Some(2),
            ..config()
        };
        assert!(build_app(&roomy).is_ok());
    }
}
