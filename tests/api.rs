mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, PASSWORD};
use serde_json::{json, Value};
use tower::ServiceExt;
use uniride::routes::create_router;

struct Client {
    router: Router,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    location: Option<String>,
    body: Value,
}

impl Client {
    async fn new() -> (Self, TestApp) {
        let app = TestApp::new().await.expect("test app");
        let router = create_router(app.state.clone());
        (Self { router }, app)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// Sends an already-serialised JSON body, which may be malformed.
    async fn send_raw(&self, method: Method, uri: &str, cookie: &str, raw: &str) -> Reply {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(raw.to_string()))
            .unwrap();
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            cookie,
            location,
            body,
        }
    }

    async fn login(&self, email: &str) -> String {
        let reply = self
            .send(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.cookie.expect("login sets a session cookie")
    }

    async fn post_ride(&self, cookie: &str, departure: &str, flexibility: &str) -> i64 {
        let reply = self
            .send(
                Method::POST,
                "/api/rides",
                Some(cookie),
                Some(json!({
                    "location": "Station1",
                    "direction": "toCampus",
                    "departureTime": departure,
                    "flexibility": flexibility,
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        reply.body["rideId"].as_i64().expect("ride id")
    }
}

#[tokio::test]
async fn register_login_and_profile() {
    let (client, _app) = Client::new().await;

    let colleges = client.send(Method::GET, "/api/colleges", None, None).await;
    assert!(colleges.body["colleges"]
        .as_array()
        .unwrap()
        .contains(&json!("MIT")));

    let reply = client
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "email": "alice@mit.edu",
                "password": PASSWORD,
                "name": "Alice",
                "college": "MIT",
                "gender": "",
                "graduationYear": "2026",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);

    let dup = client
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "email": "alice@mit.edu",
                "password": "x",
                "name": "Alice Again",
                "college": "MIT",
            })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);

    let missing = client
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "email": "bob@mit.edu" })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let wrong = client
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "alice@mit.edu", "password": "nope" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let cookie = client.login("alice@mit.edu").await;
    let me = client.send(Method::GET, "/api/user", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["college"], "MIT");
    assert_eq!(me.body["user"]["role"], "user");
    assert_eq!(me.body["user"]["graduation_year"], 2026);
    assert!(me.body["user"]["gender"].is_null());
    assert!(me.body["user"].get("password_hash").is_none());

    let update = client
        .send(
            Method::PUT,
            "/api/user",
            Some(&cookie),
            Some(json!({ "name": "Alice A.", "college": "Other", "graduationYear": 2027 })),
        )
        .await;
    assert_eq!(update.status, StatusCode::OK);
    let me = client.send(Method::GET, "/api/user", Some(&cookie), None).await;
    assert_eq!(me.body["user"]["name"], "Alice A.");
    assert_eq!(me.body["user"]["college"], "Other");

    let logout = client
        .send(Method::POST, "/api/logout", Some(&cookie), None)
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    let after = client.send(Method::GET, "/api/user", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_requests_are_rejected() {
    let (client, _app) = Client::new().await;
    for uri in ["/api/user", "/api/rides/my-rides", "/api/rides/college", "/api/rides/1"] {
        let reply = client.send(Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let forged = client
        .send(Method::GET, "/api/user", Some("uniride_session=forged"), None)
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ride_lifecycle_and_matching() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    app.register("bob@mit.edu", "MIT").await.unwrap();
    app.register("eve@yale.edu", "Yale University").await.unwrap();
    let alice = client.login("alice@mit.edu").await;
    let bob = client.login("bob@mit.edu").await;
    let eve = client.login("eve@yale.edu").await;

    let a = client.post_ride(&alice, "2025-03-14T12:00:00Z", "moderate").await;
    let b = client.post_ride(&bob, "2025-03-14T14:00:00Z", "strict").await;
    let c = client.post_ride(&bob, "2025-03-14T16:00", "strict").await;
    client.post_ride(&eve, "2025-03-14T12:30:00Z", "strict").await;

    let matches = client
        .send(
            Method::GET,
            &format!("/api/rides/{a}/matches"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(matches.status, StatusCode::OK);
    let ids: Vec<i64> = matches.body["matches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![b]);

    let not_mine = client
        .send(Method::GET, &format!("/api/rides/{a}/matches"), Some(&bob), None)
        .await;
    assert_eq!(not_mine.status, StatusCode::FORBIDDEN);

    let range = client
        .send(
            Method::GET,
            "/api/rides/matches?location=Station1&direction=toCampus&startDate=2025-03-14&endDate=2025-03-14",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(range.status, StatusCode::OK);
    let ids: Vec<i64> = range.body["matches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![b, c]);

    let inverted = client
        .send(
            Method::GET,
            "/api/rides/matches?location=Station1&direction=toCampus&startDate=2025-03-15&endDate=2025-03-14",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(inverted.status, StatusCode::BAD_REQUEST);

    let missing = client
        .send(
            Method::GET,
            "/api/rides/matches?location=Station1",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let college = client
        .send(Method::GET, "/api/rides/college", Some(&alice), None)
        .await;
    assert_eq!(college.body["rides"].as_array().unwrap().len(), 3);

    let single = client
        .send(Method::GET, &format!("/api/rides/{b}"), Some(&alice), None)
        .await;
    assert_eq!(single.body["ride"]["name"], "bob");
    assert!(single.body["ride"].get("email").is_none());

    // Alice may not touch Bob's ride.
    let cancel = client
        .send(
            Method::PUT,
            &format!("/api/rides/{b}/status"),
            Some(&alice),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::FORBIDDEN);
    let delete = client
        .send(Method::DELETE, &format!("/api/rides/{b}"), Some(&alice), None)
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let cancel = client
        .send(
            Method::PUT,
            &format!("/api/rides/{b}/status"),
            Some(&bob),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::OK);
    let bogus = client
        .send(
            Method::PUT,
            &format!("/api/rides/{c}/status"),
            Some(&bob),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);

    let mine = client
        .send(Method::GET, "/api/rides/my-rides", Some(&bob), None)
        .await;
    let ids: Vec<i64> = mine.body["rides"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![c]);

    let edit = client
        .send(
            Method::PUT,
            &format!("/api/rides/{c}"),
            Some(&bob),
            Some(json!({
                "location": "Station2",
                "direction": "fromCampus",
                "departureTime": "2025-03-20T08:00:00Z",
                "flexibility": "flexible",
            })),
        )
        .await;
    assert_eq!(edit.status, StatusCode::OK);
    let edited = client
        .send(Method::GET, &format!("/api/rides/{c}"), Some(&bob), None)
        .await;
    assert_eq!(edited.body["ride"]["location"], "Station2");
    assert_eq!(edited.body["ride"]["flexibility"], "flexible");

    let gone = client
        .send(Method::DELETE, "/api/rides/9999", Some(&bob), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    let delete = client
        .send(Method::DELETE, &format!("/api/rides/{c}"), Some(&bob), None)
        .await;
    assert_eq!(delete.status, StatusCode::OK);
    let lookup = client
        .send(Method::GET, &format!("/api/rides/{c}"), Some(&bob), None)
        .await;
    assert_eq!(lookup.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_ride_input_is_rejected() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    let alice = client.login("alice@mit.edu").await;

    for body in [
        json!({ "location": "Station1", "direction": "toCampus", "flexibility": "strict" }),
        json!({ "location": "Station1", "direction": "toCampus", "departureTime": "soon", "flexibility": "strict" }),
        json!({ "location": "Station1", "direction": "toCampus", "departureTime": "2025-03-14T12:00:00Z", "flexibility": "whenever" }),
    ] {
        let reply = client
            .send(Method::POST, "/api/rides", Some(&alice), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{:?}", reply.body);
    }
}

#[tokio::test]
async fn blank_graduation_year_is_saved_as_none() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    let alice = client.login("alice@mit.edu").await;

    let update = client
        .send(
            Method::PUT,
            "/api/user",
            Some(&alice),
            Some(json!({
                "name": "Alice",
                "college": "MIT",
                "gender": "",
                "graduationYear": "",
            })),
        )
        .await;
    assert_eq!(update.status, StatusCode::OK, "{:?}", update.body);
    let me = client.send(Method::GET, "/api/user", Some(&alice), None).await;
    assert!(me.body["user"]["graduation_year"].is_null());

    let reply = client
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({
                "email": "bob@mit.edu",
                "password": PASSWORD,
                "name": "Bob",
                "college": "MIT",
                "graduationYear": "",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
}

#[tokio::test]
async fn malformed_requests_get_a_json_400() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    let alice = client.login("alice@mit.edu").await;

    let wrong_type = client
        .send(
            Method::POST,
            "/api/rides",
            Some(&alice),
            Some(json!({
                "location": "Station1",
                "direction": "toCampus",
                "departureTime": 5,
                "flexibility": "strict",
            })),
        )
        .await;
    let not_json = client
        .send_raw(Method::POST, "/api/rides", &alice, "{\"location\": ")
        .await;
    let bad_year = client
        .send(
            Method::PUT,
            "/api/user",
            Some(&alice),
            Some(json!({ "name": "Alice", "college": "MIT", "graduationYear": "soon" })),
        )
        .await;
    let bad_id = client
        .send(Method::GET, "/api/rides/abc", Some(&alice), None)
        .await;
    let bad_query = client
        .send(
            Method::GET,
            "/api/rides/matches?location=Station1&location=Station2",
            Some(&alice),
            None,
        )
        .await;

    for reply in [wrong_type, not_json, bad_year, bad_id, bad_query] {
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{:?}", reply.body);
        assert!(reply.body["error"].is_string(), "{:?}", reply.body);
    }
}

#[tokio::test]
async fn cancelled_rides_cannot_be_matched() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    app.register("bob@mit.edu", "MIT").await.unwrap();
    let alice = client.login("alice@mit.edu").await;
    let bob = client.login("bob@mit.edu").await;

    let a = client.post_ride(&alice, "2025-03-14T12:00:00Z", "flexible").await;
    client.post_ride(&bob, "2025-03-14T13:00:00Z", "strict").await;

    let cancel = client
        .send(
            Method::PUT,
            &format!("/api/rides/{a}/status"),
            Some(&alice),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::OK, "{:?}", cancel.body);

    let matches = client
        .send(
            Method::GET,
            &format!("/api/rides/{a}/matches"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(matches.status, StatusCode::BAD_REQUEST, "{:?}", matches.body);
    assert_eq!(matches.body["error"], "Only active rides can be matched");
}

#[tokio::test]
async fn admin_access_via_password_or_role() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();
    app.register(ADMIN_EMAIL, "Other").await.unwrap();
    let alice = client.login("alice@mit.edu").await;
    client.post_ride(&alice, "2025-03-14T12:00:00Z", "strict").await;

    let anonymous = client.send(Method::GET, "/api/admin/users", None, None).await;
    assert_eq!(anonymous.status, StatusCode::FORBIDDEN);
    let as_user = client
        .send(Method::GET, "/api/admin/users", Some(&alice), None)
        .await;
    assert_eq!(as_user.status, StatusCode::FORBIDDEN);

    let wrong = client
        .send(
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({ "password": "guess" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unlocked = client
        .send(
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({ "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(unlocked.status, StatusCode::OK);
    let admin = unlocked.cookie.expect("admin session cookie");

    let users = client
        .send(Method::GET, "/api/admin/users", Some(&admin), None)
        .await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.body["users"].as_array().unwrap().len(), 2);

    let rides = client
        .send(Method::GET, "/api/admin/rides", Some(&admin), None)
        .await;
    assert_eq!(rides.body["rides"][0]["email"], "alice@mit.edu");

    let role = client
        .send(Method::GET, "/api/user/role", Some(&admin), None)
        .await;
    assert_eq!(role.body["canSwitch"], false);

    let by_role = client.login(ADMIN_EMAIL).await;
    let login_role = client
        .send(Method::GET, "/api/user/role", Some(&by_role), None)
        .await;
    assert_eq!(login_role.body, json!({ "role": "admin", "canSwitch": true }));
    let users = client
        .send(Method::GET, "/api/admin/users", Some(&by_role), None)
        .await;
    assert_eq!(users.status, StatusCode::OK);

    let logout = client
        .send(Method::POST, "/api/admin/logout", Some(&admin), None)
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    let after = client
        .send(Method::GET, "/api/admin/users", Some(&admin), None)
        .await;
    assert_eq!(after.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pages_are_gated_by_session() {
    let (client, app) = Client::new().await;
    app.register("alice@mit.edu", "MIT").await.unwrap();

    let home = client.send(Method::GET, "/", None, None).await;
    assert_eq!(home.status, StatusCode::OK);

    let dashboard = client.send(Method::GET, "/dashboard.html", None, None).await;
    assert_eq!(dashboard.status, StatusCode::SEE_OTHER);
    assert_eq!(dashboard.location.as_deref(), Some("/login.html"));

    let login_page = client.send(Method::GET, "/login.html", None, None).await;
    assert_eq!(login_page.status, StatusCode::OK);

    let alice = client.login("alice@mit.edu").await;
    let home = client.send(Method::GET, "/", Some(&alice), None).await;
    assert_eq!(home.location.as_deref(), Some("/dashboard.html"));
    let dashboard = client
        .send(Method::GET, "/dashboard.html", Some(&alice), None)
        .await;
    assert_eq!(dashboard.status, StatusCode::OK);
}
