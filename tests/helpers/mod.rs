//! Test harness driving the full router in-process.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header, request},
};

use hearthstone_tracker::{
    app::AppState,
    auth::{self, hash_password},
    config::Config,
    routes,
    user::{self, NewUser},
};

use hearthstone_tracker_model::Rank;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use tower::ServiceExt as _;

use tower_sessions::{SessionManagerLayer, cookie::Key};
use tower_sessions_moka_store::MokaStore;

pub const PASSWORD: &str = "password123";

/// A running app, acting as a single browser.
pub struct TestApp {
    pub db: SqlitePool,
    router: Router,
    cookie: Option<String>,
}

/// A response with its body read.
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestApp {
    pub async fn new() -> TestApp {
        // a single connection keeps the in-memory database alive
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&db).await.unwrap();

        let session_layer = SessionManagerLayer::new(MokaStore::new(Some(100)))
            .with_name("id")
            .with_secure(false)
            .with_private(Key::generate());

        let router = routes::router(AppState::new(db.clone(), Config::default())).layer(session_layer);

        TestApp {
            db,
            router,
            cookie: None,
        }
    }

    /// Creates a user with [`PASSWORD`], returning their ID.
    pub async fn create_user(&self, name: &str) -> i32 {
        let hash = hash_password(PASSWORD, auth::MIN_COST).await.unwrap();
        let email = email(name);

        let mut conn = self.db.acquire().await.unwrap();
        user::create_user(
            &NewUser {
                name,
                email: &email,
                password_hash: &hash,
                rank: None,
            },
            &mut conn,
        )
        .await
        .unwrap()
    }

    /// Sets a user's rank behind the app's back.
    pub async fn set_rank(&self, name: &str, rank: i64) {
        let mut conn = self.db.acquire().await.unwrap();
        user::set_rank_by_email(&email(name), Some(Rank::new(rank).unwrap()), &mut conn)
            .await
            .unwrap()
            .unwrap();
    }

    /// Reads a user's rank straight from the database.
    pub async fn rank_of(&self, id: i32) -> Option<Rank> {
        let mut conn = self.db.acquire().await.unwrap();
        user::get_user(id, &mut conn)
            .await
            .unwrap()
            .unwrap()
            .rank()
            .unwrap()
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = Request::get(path);
        self.send(request, Body::empty()).await
    }

    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(body)).await
    }

    pub async fn patch_json(&mut self, path: &str, json: &str) -> TestResponse {
        let request = Request::patch(path).header(header::CONTENT_TYPE, "application/json");
        self.send(request, Body::from(json.to_owned())).await
    }

    /// Signs in through the login form.
    pub async fn sign_in(&mut self, name: &str) {
        let page = self.get("/login").await;
        let csrf = csrf(&page.body);
        let email = email(name);

        let response = self
            .post_form(
                "/login",
                &[
                    ("email", email.as_str()),
                    ("password", PASSWORD),
                    ("csrf", csrf.as_str()),
                ],
            )
            .await;

        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location.as_deref(), Some("/"));
    }

    /// Clicks a button on the home page by its ID.
    ///
    /// Panics if the button is not on the page.
    pub async fn click_button(&mut self, id: &str) -> TestResponse {
        let page = self.get("/").await;
        let action = form_action(&page.body, id)
            .unwrap_or_else(|| panic!("no button {:?} on page", id));
        let csrf = csrf(&page.body);

        let response = self.post_form(&action, &[("csrf", csrf.as_str())]).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        self.get("/").await
    }

    async fn send(&mut self, mut request: request::Builder, body: Body) -> TestResponse {
        if let Some(cookie) = self.cookie.as_ref() {
            request = request.header(header::COOKIE, cookie);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        self.read(response).await
    }

    async fn read(&mut self, response: Response<Body>) -> TestResponse {
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let cookie = set_cookie.split(';').next().unwrap().to_owned();
            self.cookie = Some(cookie);
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_owned());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }
}

pub fn email(name: &str) -> String {
    format!("{}@ftp.com", name)
}

/// Finds the CSRF token of the first form on a page.
pub fn csrf(html: &str) -> String {
    const FIELD: &str = "name=\"csrf\" value=\"";

    let start = html.find(FIELD).expect("page has a form") + FIELD.len();
    let end = start + html[start..].find('"').unwrap();

    html[start..end].to_owned()
}

/// Finds the action of the form holding the button `id`.
pub fn form_action(html: &str, id: &str) -> Option<String> {
    let button = html.find(&format!("id=\"{}\"", id))?;
    let form = html[..button].rfind("<form ")?;

    let start = form + html[form..].find("action=\"")? + "action=\"".len();
    let end = start + html[start..].find('"')?;

    Some(html[start..end].to_owned())
}

/// The HTML of a listed user.
pub fn user_block(html: &str, id: i32) -> Option<&str> {
    let start = html.find(&format!("<div class=\"user\" id=\"{}\">", id))?;
    let rest = &html[start + 1..];
    let end = rest
        .find("<div class=\"user\" ")
        .unwrap_or(rest.len());

    Some(&html[start..start + 1 + end])
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            _ => format!("%{:02X}", byte),
        })
        .collect()
}
