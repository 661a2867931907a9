use std::env;
use std::path::Path;
use std::process::ExitCode;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use http_pipeline::middleware::cors;
use http_pipeline::{Cookie, Error, Request, Response, Router, SameSite, Server, ServerConfig, StatusCode};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match env::args().nth(1) {
        Some(path) => match ServerConfig::from_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!(cause = %e, path = %path, "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };

    info!(
        app = %config.app_name,
        address = %config.address(),
        static_root = %config.static_root.display(),
        "configuration loaded"
    );

    let app_name = config.app_name.clone();
    let mut router = Router::new();
    router
        .middleware("/", cors)
        .middleware("/json", |request, _| {
            info!(target = %request.target(), "json endpoint");
            Ok(())
        })
        .get("/", index)
        // `/json` also matches `/json/?id=...`, so the predicate route goes first.
        .get("/json/?id=str", |request, mut response| {
            response.json(&json!({ "id": request.query_param("id") }))?;
            Ok(response)
        })
        .get("/json", move |_, mut response| {
            response.json(&json!({ "app": app_name, "message": "hello" }))?;
            Ok(response)
        })
        .get("/cookie", set_session)
        .post("/data", echo_json)
        .post("/upload/:data", |request, mut response| {
            response.json(request.params())?;
            Ok(response)
        })
        .post("/file", |request, mut response| {
            match request.files() {
                Some(files) => response.json(files)?,
                None => response.set_status(StatusCode::BAD_REQUEST),
            }
            Ok(response)
        });

    if let Err(e) = Server::new(config, router).start() {
        error!(cause = %e, "server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn index(_: &Request, mut response: Response) -> Result<Response, Error> {
    if response.http_file_response("/index.html").is_err() {
        response.set_content_type("text/html");
        response.set_body("<html><body><h1>It works</h1></body></html>");
    }
    Ok(response)
}

fn set_session(request: &Request, mut response: Response) -> Result<Response, Error> {
    let visits = request
        .cookie("visits")
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_default()
        + 1;

    let mut cookie = Cookie::new("visits", visits.to_string());
    cookie
        .set_http_only(true)
        .set_same_site(SameSite::Lax)
        .set_expires(Utc::now() + Duration::days(1));
    response.add_cookie(cookie);
    response.set_body(format!("visit number {visits}"));
    Ok(response)
}

fn echo_json(request: &Request, mut response: Response) -> Result<Response, Error> {
    match request.body_json::<Value>() {
        Ok(body) => response.json(&json!({ "received": body }))?,
        Err(e) => {
            response.set_status(StatusCode::BAD_REQUEST);
            response.set_body(e.to_string());
        }
    }
    Ok(response)
}
