use http::StatusCode;
use quill::db::{Database, PoolOptions, Sqlite};
use quill::orm::{Field, Mapping, Query};
use quill::signature::Signature;
use quill::template::{RenderError, Templates};
use quill::{ApiError, App, Args, HandlerError, Method, Reply, Request, Response, Router};
use serde_json::{Map, Value, json};

async fn echo(args: Args) -> Result<Reply, HandlerError> {
    Ok(Reply::Map(args.keywords().clone()))
}

async fn register(args: Args) -> Result<Reply, HandlerError> {
    let email = args.str("email").unwrap_or_default();
    if !email.contains('@') {
        return Err(ApiError::value_error("email", "Invalid email.").into());
    }
    Ok(Reply::json(json!({ "email": email })))
}

async fn whoami(args: Args) -> Result<Reply, HandlerError> {
    let req = args.request().ok_or_else(|| ApiError::permission("no request"))?;
    let agent = req.header("user-agent").unwrap_or("unknown").to_owned();
    Ok(Reply::json(json!({ "agent": agent, "page": args.int("page") })))
}

async fn fails(_: Args) -> Result<Reply, HandlerError> {
    Err(quill::Error::Config("boom".into()).into())
}

struct Fixed;

impl Templates for Fixed {
    fn render(&self, name: &str, _context: &Map<String, Value>) -> Result<String, RenderError> {
        Ok(format!("rendered {name}"))
    }
}

fn app() -> App {
    let router = Router::new()
        .post("/echo", Signature::new("echo").keyword("a"), echo)
        .get("/echo", Signature::new("echo").keyword_default("a").keyword_default("b"), echo)
        .route(Method::Put, "/any", Signature::new("any").var_keyword("kw"), echo)
        .get("/blog/{id}", Signature::new("get_blog").positional("id").keyword_default("id"), echo)
        .post("/api/users", Signature::new("register").keyword("email").keyword_default("name"), register)
        .get(
            "/whoami",
            Signature::new("whoami").positional("request").keyword_default("page"),
            whoami,
        )
        .get("/signin", Signature::new("signin"), |_: Args| async {
            Ok::<_, HandlerError>(Reply::redirect("/login"))
        })
        .get("/missing", Signature::new("missing"), |_: Args| async {
            Ok::<_, HandlerError>((404u16, "not found"))
        })
        .get("/page", Signature::new("page"), |_: Args| async {
            Ok::<_, HandlerError>(Reply::template("page.html", json!({})))
        })
        .get("/raw", Signature::new("raw"), |_: Args| async {
            Ok::<_, HandlerError>(Response::builder().status(StatusCode::CREATED).text("made"))
        })
        .get("/fails", Signature::new("fails"), fails);
    App::new(router).templates(Fixed)
}

fn json_body(r: &Response) -> Value {
    serde_json::from_slice(r.body()).unwrap()
}

fn post(path: &str, content_type: &str, body: &'static str) -> Request {
    Request::builder(Method::Post, path)
        .header("Content-Type", content_type)
        .body(body)
}

#[tokio::test]
async fn json_body_fills_keywords() {
    let r = app().handle(post("/echo", "application/json", r#"{"a":1,"extra":true}"#)).await;
    assert_eq!(r.status_code(), StatusCode::OK);
    assert_eq!(json_body(&r), json!({"a": 1}));
}

#[tokio::test]
async fn non_object_json_is_rejected() {
    let r = app().handle(post("/echo", "application/json", "[1,2]")).await;
    assert_eq!(r.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(r.body(), b"JSON body must be object.");
}

#[tokio::test]
async fn unsupported_content_type_is_rejected() {
    let r = app().handle(post("/echo", "text/xml", "<a>1</a>")).await;
    assert_eq!(r.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn missing_content_type_is_rejected() {
    let req = Request::builder(Method::Post, "/echo").body("a=1");
    let r = app().handle(req).await;
    assert_eq!(r.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn form_body_fills_keywords() {
    let r = app()
        .handle(post("/echo", "application/x-www-form-urlencoded; charset=utf-8", "a=x&a=y"))
        .await;
    assert_eq!(json_body(&r), json!({"a": "x"}));
}

#[tokio::test]
async fn multipart_body_fills_keywords() {
    let body = "--b0\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--b0--\r\n";
    let r = app().handle(post("/echo", "multipart/form-data; boundary=b0", body)).await;
    assert_eq!(json_body(&r), json!({"a": "hello"}));
}

#[tokio::test]
async fn missing_required_keyword_names_it() {
    let r = app().handle(post("/echo", "application/json", r#"{"b":1}"#)).await;
    assert_eq!(r.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(r.body(), b"Missing argument: a");
}

#[tokio::test]
async fn query_string_first_value_wins() {
    let req = Request::builder(Method::Get, "/echo?a=1&a=2&b=&c=3").build();
    let r = app().handle(req).await;
    assert_eq!(json_body(&r), json!({"a": "1", "b": ""}));
}

#[tokio::test]
async fn var_keyword_handler_keeps_every_key() {
    let req = Request::builder(Method::Put, "/any")
        .header("content-type", "application/json")
        .body(r#"{"x":1,"y":[2]}"#);
    let r = app().handle(req).await;
    assert_eq!(json_body(&r), json!({"x": 1, "y": [2]}));
}

#[tokio::test]
async fn path_params_fill_and_override() {
    let r = app().handle(Request::builder(Method::Get, "/blog/42").build()).await;
    assert_eq!(json_body(&r), json!({"id": "42"}));

    let r = app().handle(Request::builder(Method::Get, "/blog/42?id=7").build()).await;
    assert_eq!(json_body(&r), json!({"id": "42"}));
}

#[tokio::test]
async fn request_is_injected() {
    let req = Request::builder(Method::Get, "/whoami?page=3&request=x")
        .header("User-Agent", "curl")
        .build();
    let r = app().handle(req).await;
    assert_eq!(json_body(&r), json!({"agent": "curl", "page": 3}));
}

#[tokio::test]
async fn api_errors_become_structured_json() {
    let r = app().handle(post("/api/users", "application/json", r#"{"email":"nope"}"#)).await;
    assert_eq!(r.status_code(), StatusCode::OK);
    assert_eq!(
        json_body(&r),
        json!({"error": "value:invalid", "data": "email", "message": "Invalid email."})
    );

    let r = app().handle(post("/api/users", "application/json", r#"{"email":"a@b.c"}"#)).await;
    assert_eq!(json_body(&r), json!({"email": "a@b.c"}));
}

#[tokio::test]
async fn internal_errors_are_server_errors() {
    let r = app().handle(Request::builder(Method::Get, "/fails").build()).await;
    assert_eq!(r.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn reply_shapes_are_normalized() {
    let app = app();

    let r = app.handle(Request::builder(Method::Get, "/signin").build()).await;
    assert_eq!(r.status_code(), StatusCode::FOUND);
    assert_eq!(r.header("location"), Some("/login"));

    let r = app.handle(Request::builder(Method::Get, "/missing").build()).await;
    assert_eq!(r.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(r.body(), b"not found");

    let r = app.handle(Request::builder(Method::Get, "/page").build()).await;
    assert_eq!(r.body(), b"rendered page.html");

    let r = app.handle(Request::builder(Method::Get, "/raw").build()).await;
    assert_eq!(r.status_code(), StatusCode::CREATED);
    assert_eq!(r.body(), b"made");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = app();
    let r = app.handle(Request::builder(Method::Get, "/nowhere").build()).await;
    assert_eq!(r.status_code(), StatusCode::NOT_FOUND);

    let r = app.handle(Request::builder(Method::Delete, "/echo").build()).await;
    assert_eq!(r.status_code(), StatusCode::NOT_FOUND);
}

async fn listing_app() -> App {
    let users = Mapping::define("User")
        .table("users")
        .field("id", Field::string().primary_key().ddl("varchar(50)"))
        .field("name", Field::string().ddl("varchar(50)"))
        .register()
        .unwrap();
    let db = Database::with_driver(Sqlite::in_memory(), PoolOptions::default()).await.unwrap();
    db.execute("CREATE TABLE users (id varchar(50) PRIMARY KEY, name varchar(50) NOT NULL)", &[], true)
        .await
        .unwrap();

    let router = Router::new().get("/list", Signature::new("list").keyword_default("limit"), move |args: Args| {
        let users = users.clone();
        async move {
            let mut query = Query::new();
            if let Some(limit) = args.get("limit") {
                query = query.limit(limit);
            }
            let list = users.find_all(args.database()?, query).await?;
            Ok::<_, HandlerError>(Reply::json(serde_json::json!({ "users": list })))
        }
    });
    let app = App::new(router);
    assert!(app.set_database(db));
    app
}

#[tokio::test]
async fn malformed_limit_is_a_bad_request() {
    let app = listing_app().await;

    let r = app.handle(Request::builder(Method::Get, "/list?limit=abc").build()).await;
    assert_eq!(r.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(r.body(), b"invalid limit value: \"abc\"");

    let r = app.handle(Request::builder(Method::Get, "/list").build()).await;
    assert_eq!(r.status_code(), StatusCode::OK);
    assert_eq!(json_body(&r), json!({"users": []}));
}
