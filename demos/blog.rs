//! A tiny blog: users, blogs and comments on an in-memory SQLite database.
//!
//! ```text
//! cargo run --example blog
//! curl -X POST localhost:9000/api/users -H 'content-type: application/json' \
//!      -d '{"email":"a@example.com","name":"Ann"}'
//! curl 'localhost:9000/api/users?page=1'
//! ```

use std::sync::Arc;

use quill::config::Config;
use quill::db::Database;
use quill::orm::{Field, Mapping, Query, Record, Value, next_id, now};
use quill::signature::Signature;
use quill::{ApiError, App, Args, HandlerError, Reply, Router, Server};
use serde_json::json;
use tracing::info;

const PAGE_SIZE: i64 = 10;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE users (id varchar(50) PRIMARY KEY, email varchar(50) UNIQUE NOT NULL, \
     passwd varchar(50) NOT NULL, admin boolean NOT NULL, name varchar(50) NOT NULL, \
     image varchar(500) NOT NULL, created_at real NOT NULL)",
    "CREATE TABLE blogs (id varchar(50) PRIMARY KEY, user_id varchar(50) NOT NULL, \
     user_name varchar(50) NOT NULL, name varchar(50) NOT NULL, summary varchar(200) NOT NULL, \
     content text NOT NULL, created_at real NOT NULL)",
    "CREATE TABLE comments (id varchar(50) PRIMARY KEY, blog_id varchar(50) NOT NULL, \
     user_id varchar(50) NOT NULL, user_name varchar(50) NOT NULL, content text NOT NULL, \
     created_at real NOT NULL)",
];

struct Models {
    users: Arc<Mapping>,
    blogs: Arc<Mapping>,
    comments: Arc<Mapping>,
}

fn models() -> quill::Result<Models> {
    let id = || Field::string().primary_key().ddl("varchar(50)").default_with(next_id);

    let users = Mapping::define("User")
        .table("users")
        .field("id", id())
        .field("email", Field::string().ddl("varchar(50)"))
        .field("passwd", Field::string().ddl("varchar(50)"))
        .field("admin", Field::boolean())
        .field("name", Field::string().ddl("varchar(50)"))
        .field("image", Field::string().ddl("varchar(500)"))
        .field("created_at", Field::float().default_with(now))
        .register()?;

    let blogs = Mapping::define("Blog")
        .table("blogs")
        .field("id", id())
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("name", Field::string().ddl("varchar(50)"))
        .field("summary", Field::string().ddl("varchar(200)"))
        .field("content", Field::text())
        .field("created_at", Field::float().default_with(now))
        .register()?;

    let comments = Mapping::define("Comment")
        .table("comments")
        .field("id", id())
        .field("blog_id", Field::string().ddl("varchar(50)"))
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("content", Field::text())
        .field("created_at", Field::float().default_with(now))
        .register()?;

    Ok(Models { users, blogs, comments })
}

#[tokio::main]
async fn main() -> quill::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_layers(
        json!({
            "server": { "host": "127.0.0.1", "port": 9000 },
            "db": { "backend": "sqlite", "user": "www-data", "password": "www-data", "database": ":memory:" }
        }),
        None,
    )?;

    let Models { users, blogs, comments } = models()?;

    let router = Router::new()
        .get("/", Signature::new("index"), {
            let blogs = blogs.clone();
            move |args: Args| {
                let blogs = blogs.clone();
                async move { index(&args, &blogs).await }
            }
        })
        .get("/blog/{id}", Signature::new("get_blog").positional("id"), {
            let (blogs, comments) = (blogs.clone(), comments.clone());
            move |args: Args| {
                let (blogs, comments) = (blogs.clone(), comments.clone());
                async move { get_blog(&args, &blogs, &comments).await }
            }
        })
        .post(
            "/api/users",
            Signature::new("api_register_user")
                .keyword("email")
                .keyword("name")
                .keyword_default("image"),
            {
                let users = users.clone();
                move |args: Args| {
                    let users = users.clone();
                    async move { register(&args, &users).await }
                }
            },
        )
        .get("/api/users", Signature::new("api_get_users").keyword_default("page"), {
            let users = users.clone();
            move |args: Args| {
                let users = users.clone();
                async move { list_users(&args, &users).await }
            }
        })
        .get("/signout", Signature::new("signout").positional("request"), |args: Args| async move {
            let back = args
                .request()
                .and_then(|r| r.header("referer"))
                .unwrap_or("/")
                .to_owned();
            Ok::<_, HandlerError>(Reply::redirect(&back))
        });

    let app = App::new(router);
    let db = app.create_pool(&config.db).await?;
    for ddl in SCHEMA {
        db.execute(ddl, &[], true).await?;
    }
    seed(&db, &users, &blogs, &comments).await?;

    let addr = config.server.addr()?;
    info!(%addr, "blog demo ready");
    Server::bind(addr).serve(app).await
}

async fn index(args: &Args, blogs: &Arc<Mapping>) -> Result<Reply, HandlerError> {
    let list = blogs.find_all(args.database()?, Query::new().order_by("created_at desc")).await?;
    Ok(Reply::json(json!({ "blogs": list })))
}

async fn get_blog(
    args: &Args,
    blogs: &Arc<Mapping>,
    comments: &Arc<Mapping>,
) -> Result<Reply, HandlerError> {
    let db = args.database()?;
    let id = args.str("id").unwrap_or_default();
    let Some(blog) = blogs.find(db, id.as_str()).await? else {
        return Ok((404u16, "blog not found").into());
    };
    let query = Query::new()
        .filter("`blog_id`=?")
        .arg(id)
        .order_by("created_at desc");
    let comments = comments.find_all(db, query).await?;
    Ok(Reply::json(json!({ "blog": blog, "comments": comments })))
}

async fn register(args: &Args, users: &Arc<Mapping>) -> Result<Reply, HandlerError> {
    let db = args.database()?;
    let name = args.str("name").unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ApiError::value_error("name", "Name must not be empty.").into());
    }
    let email = args.str("email").unwrap_or_default();
    if !email.contains('@') {
        return Err(ApiError::value_error("email", "Invalid email.").into());
    }

    let taken = users
        .find_all(db, Query::new().filter("`email`=?").arg(email.as_str()))
        .await?;
    if !taken.is_empty() {
        return Err(ApiError::new("register:failed", "email", "Email is already in use.").into());
    }

    let image = args.str("image").unwrap_or_else(|| "about:blank".to_owned());
    let mut user = Record::new(users)
        .with("email", email)
        .with("passwd", "******")
        .with("admin", false)
        .with("name", name.trim())
        .with("image", image);
    user.save(db).await?;

    Ok(Reply::json(&user))
}

async fn list_users(args: &Args, users: &Arc<Mapping>) -> Result<Reply, HandlerError> {
    let db = args.database()?;
    let page = args.int("page").unwrap_or(1).max(1);
    let total = users
        .find_number(db, "count(id)", None, &[])
        .await?
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    let offset = page_offset(page);
    let list = if offset < total {
        users
            .find_all(db, Query::new().order_by("created_at desc").limit((offset, PAGE_SIZE)))
            .await?
    } else {
        Vec::new()
    };

    Ok(Reply::json(json!({
        "page": { "index": page, "total": total, "size": PAGE_SIZE },
        "users": list,
    })))
}

/// Row offset of a 1-based page; huge page numbers saturate instead of
/// overflowing.
fn page_offset(page: i64) -> i64 {
    page.max(1).saturating_sub(1).saturating_mul(PAGE_SIZE)
}

async fn seed(
    db: &Database,
    users: &Arc<Mapping>,
    blogs: &Arc<Mapping>,
    comments: &Arc<Mapping>,
) -> quill::Result<()> {
    let mut admin = Record::new(users)
        .with("email", "admin@example.com")
        .with("passwd", "******")
        .with("admin", true)
        .with("name", "Admin")
        .with("image", "about:blank");
    admin.save(db).await?;

    let user_id = admin.get_value("id").cloned().unwrap_or(Value::Null);
    let mut blog = Record::new(blogs)
        .with("user_id", user_id.clone())
        .with("user_name", "Admin")
        .with("name", "Hello")
        .with("summary", "The first post.")
        .with("content", "Written with quill.");
    blog.save(db).await?;

    let blog_id = blog.get_value("id").cloned().unwrap_or(Value::Null);
    Record::new(comments)
        .with("blog_id", blog_id)
        .with("user_id", user_id)
        .with("user_name", "Admin")
        .with("content", "First!")
        .save(db)
        .await?;
    Ok(())
}
