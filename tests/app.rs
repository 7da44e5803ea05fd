use std::path::Path;

use http::StatusCode;
use quill::config::{Backend, DbConfig};
use quill::signature::Signature;
use quill::{App, Args, Error, HandlerError, Method, Reply, Request, Router};

fn sqlite_config(path: &Path, max_size: usize) -> DbConfig {
    DbConfig {
        backend: Backend::Sqlite,
        user: Some("www-data".to_owned()),
        password: Some("www-data".to_owned()),
        database: Some(path.display().to_string()),
        max_size,
        ..DbConfig::default()
    }
}

async fn ping(args: Args) -> Result<Reply, HandlerError> {
    let rows = args.database()?.select("SELECT 1 AS one", &[], Some(1)).await?;
    Ok(Reply::from(rows.len() as i64))
}

fn app() -> App {
    App::new(Router::new().get("/ping", Signature::new("ping"), ping))
}

#[tokio::test]
async fn create_pool_keeps_the_first_pool() {
    let dir = tempfile::tempdir().unwrap();
    let app = app();

    let first = app.create_pool(&sqlite_config(&dir.path().join("a.db"), 3)).await.unwrap();
    let second = app.create_pool(&sqlite_config(&dir.path().join("b.db"), 7)).await.unwrap();

    assert_eq!(first.status().max_size, 3);
    assert_eq!(second.status().max_size, 3);
    assert_eq!(app.database().map(|db| db.status().max_size), Some(3));
    assert!(!app.set_database(second));
}

#[tokio::test]
async fn create_pool_requires_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let app = app();

    let mut config = sqlite_config(&dir.path().join("a.db"), 3);
    config.password = None;

    let err = app.create_pool(&config).await.unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("password")));
    assert!(app.database().is_none());

    // A failed attempt leaves the app free to open a pool later.
    config.password = Some("www-data".to_owned());
    assert!(app.create_pool(&config).await.is_ok());
}

#[tokio::test]
async fn handlers_reach_the_app_pool() {
    let dir = tempfile::tempdir().unwrap();
    let app = app();

    let r = app.handle(Request::builder(Method::Get, "/ping").build()).await;
    assert_eq!(r.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    app.create_pool(&sqlite_config(&dir.path().join("a.db"), 2)).await.unwrap();
    let r = app.handle(Request::builder(Method::Get, "/ping").build()).await;
    assert_eq!(r.status_code(), StatusCode::OK);
    assert_eq!(r.body(), b"1");
}
