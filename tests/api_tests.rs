use bookreview_api::{
    AppConfig, AppState, MemoryRepository, auth, create_router,
    models::{Role, User},
    repository::{Repository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
}

/// Spawns the full router on an ephemeral port, backed by the in-memory
/// repository so the HTTP stack (auth middleware, policy checks, error
/// mapping) is exercised end-to-end without a database.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let state = AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

async fn register(
    client: &reqwest::Client,
    app: &TestApp,
    username: &str,
    email: &str,
    password: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({ "username": username, "email": email, "password": password }))
        .send()
        .await
        .expect("register request failed")
}

async fn login(client: &reqwest::Client, app: &TestApp, identifier: &str, password: &str) -> String {
    let resp = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({ "usernameOrEmail": identifier, "password": password }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(resp.status(), 200, "login should succeed");
    resp.json::<Value>().await.unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Seeds an ADMIN account directly through the repository (registration always
/// yields USER) and returns a logged-in token for it.
async fn admin_token(client: &reqwest::Client, app: &TestApp) -> String {
    app.repo
        .create_user(User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: auth::hash_password("admin-secret").unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap();
    login(client, app, "admin", "admin-secret").await
}

async fn create_book(
    client: &reqwest::Client,
    app: &TestApp,
    token: &str,
    title: &str,
    author: &str,
) -> Value {
    let resp = client
        .post(format!("{}/api/books", app.address))
        .bearer_auth(token)
        .json(&json!({ "title": title, "author": author, "genre": "Fiction" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "book creation should succeed");
    resp.json::<Value>().await.unwrap()
}

async fn add_review(
    client: &reqwest::Client,
    app: &TestApp,
    token: &str,
    book_id: &str,
    comment: &str,
    rating: i32,
) -> reqwest::Response {
    client
        .post(format!("{}/api/books/{}/reviews", app.address, book_id))
        .bearer_auth(token)
        .json(&json!({ "comment": comment, "rating": rating }))
        .send()
        .await
        .unwrap()
}

// --- Health ---

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("request failed");
    assert!(response.status().is_success());
}

// --- Registration & Login ---

#[tokio::test]
async fn register_returns_view_without_password() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = register(&client, &app, "alice", "alice@example.com", "password1").await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "USER");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn register_rejects_duplicate_username_and_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    assert_eq!(
        register(&client, &app, "bob", "bob@example.com", "password1")
            .await
            .status(),
        200
    );

    // Same username, different email.
    let resp = register(&client, &app, "bob", "other@example.com", "password1").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Username already exists");

    // Same email, different username.
    let resp = register(&client, &app, "robert", "bob@example.com", "password1").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn register_validates_input() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Empty username.
    let resp = register(&client, &app, "  ", "a@example.com", "password1").await;
    assert_eq!(resp.status(), 400);

    // Malformed email.
    let resp = register(&client, &app, "carol", "not-an-email", "password1").await;
    assert_eq!(resp.status(), 400);

    // Too-short password.
    let resp = register(&client, &app, "carol", "carol@example.com", "short").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn login_works_with_username_or_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "dora", "dora@example.com", "password1").await;

    let by_username = login(&client, &app, "dora", "password1").await;
    let by_email = login(&client, &app, "dora@example.com", "password1").await;
    assert!(!by_username.is_empty());
    assert!(!by_email.is_empty());
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "erin", "erin@example.com", "password1").await;

    // Wrong password.
    let resp = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({ "usernameOrEmail": "erin", "password": "wrong-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Unknown identifier.
    let resp = client
        .post(format!("{}/auth/login", app.address))
        .json(&json!({ "usernameOrEmail": "nobody", "password": "password1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

// --- Book Catalog ---

#[tokio::test]
async fn create_book_requires_authentication() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let payload = json!({ "title": "Dune", "author": "Frank Herbert", "genre": "Sci-Fi" });

    // No token at all.
    let resp = client
        .post(format!("{}/api/books", app.address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Garbage token.
    let resp = client
        .post(format!("{}/api/books", app.address))
        .bearer_auth("not-a-real-token")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn book_lifecycle_create_get_list() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "frank", "frank@example.com", "password1").await;
    let token = login(&client, &app, "frank", "password1").await;

    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap();
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["genre"], "Fiction");

    // Retrievable by its returned id.
    let resp = client
        .get(format!("{}/api/books/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let fetched: Value = resp.json().await.unwrap();
    assert_eq!(fetched["id"], book["id"]);

    // And present in the listing.
    let resp = client
        .get(format!("{}/api/books", app.address))
        .send()
        .await
        .unwrap();
    let all: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn duplicate_title_author_pair_conflicts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "gina", "gina@example.com", "password1").await;
    let token = login(&client, &app, "gina", "password1").await;

    create_book(&client, &app, &token, "Dune", "Frank Herbert").await;

    // Identical (title, author) pair fails.
    let resp = client
        .post(format!("{}/api/books", app.address))
        .bearer_auth(&token)
        .json(&json!({ "title": "Dune", "author": "Frank Herbert", "genre": "Sci-Fi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Same title, different author succeeds independently.
    create_book(&client, &app, &token, "Dune", "Someone Else").await;
}

#[tokio::test]
async fn create_book_validates_fields() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "hank", "hank@example.com", "password1").await;
    let token = login(&client, &app, "hank", "password1").await;

    let cases = [
        json!({ "title": "", "author": "A", "genre": "G" }),
        json!({ "title": "T", "author": "   ", "genre": "G" }),
        json!({ "title": "T", "author": "A", "genre": "" }),
        json!({ "title": "x".repeat(256), "author": "A", "genre": "G" }),
        json!({ "title": "T", "author": "x".repeat(256), "genre": "G" }),
        json!({ "title": "T", "author": "A", "genre": "x".repeat(51) }),
    ];
    for payload in cases {
        let resp = client
            .post(format!("{}/api/books", app.address))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload should be rejected: {payload}");
    }
}

#[tokio::test]
async fn get_unknown_book_is_404_with_message() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let id = Uuid::new_v4();

    let resp = client
        .get(format!("{}/api/books/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["message"],
        format!("Book not found with ID: {}", id)
    );
}

#[tokio::test]
async fn delete_book_is_admin_only_and_cascades() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "ivy", "ivy@example.com", "password1").await;
    let user_token = login(&client, &app, "ivy", "password1").await;
    let admin = admin_token(&client, &app).await;

    let book = create_book(&client, &app, &user_token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();
    let resp = add_review(&client, &app, &user_token, &id, "great", 5).await;
    assert_eq!(resp.status(), 200);

    // Regular user may not delete books.
    let resp = client
        .delete(format!("{}/api/books/{}", app.address, id))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Admin may; 204 on success.
    let resp = client
        .delete(format!("{}/api/books/{}", app.address, id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // The book is gone...
    let resp = client
        .get(format!("{}/api/books/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // ...its review collection with it, and a second delete is 404.
    let resp = client
        .get(format!("{}/api/books/{}/reviews", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!("{}/api/books/{}", app.address, id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// --- Reviews & Average Rating ---

#[tokio::test]
async fn review_requires_existing_book() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "jack", "jack@example.com", "password1").await;
    let token = login(&client, &app, "jack", "password1").await;

    let resp = add_review(&client, &app, &token, &Uuid::new_v4().to_string(), "hi", 3).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn review_validation_rejects_bad_ratings_without_persisting() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "kate", "kate@example.com", "password1").await;
    let token = login(&client, &app, "kate", "password1").await;

    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();

    for rating in [0, 6, -1] {
        let resp = add_review(&client, &app, &token, &id, "out of range", rating).await;
        assert_eq!(resp.status(), 400);
    }
    let resp = add_review(&client, &app, &token, &id, "", 3).await;
    assert_eq!(resp.status(), 400);
    let resp = add_review(&client, &app, &token, &id, &"x".repeat(1001), 3).await;
    assert_eq!(resp.status(), 400);

    // Nothing was persisted.
    let reviews: Vec<Value> = client
        .get(format!("{}/api/books/{}/reviews", app.address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(reviews.is_empty());
}

#[tokio::test]
async fn review_view_is_camel_case_with_reviewer_name() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "liam", "liam@example.com", "password1").await;
    let token = login(&client, &app, "liam", "password1").await;

    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();

    let resp = add_review(&client, &app, &token, &id, "a classic", 5).await;
    assert_eq!(resp.status(), 200);
    let review: Value = resp.json().await.unwrap();
    assert_eq!(review["comment"], "a classic");
    assert_eq!(review["rating"], 5);
    assert_eq!(review["reviewerName"], "liam");
    assert!(review["userId"].is_string());
    assert!(review["createdAt"].is_string());
    assert!(review["updatedAt"].is_string());
}

#[tokio::test]
async fn reviews_list_in_creation_order() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "mona", "mona@example.com", "password1").await;
    let token = login(&client, &app, "mona", "password1").await;

    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();

    for (i, rating) in [1, 3, 5].iter().enumerate() {
        let resp = add_review(&client, &app, &token, &id, &format!("review {i}"), *rating).await;
        assert_eq!(resp.status(), 200);
    }

    let reviews: Vec<Value> = client
        .get(format!("{}/api/books/{}/reviews", app.address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reviews.len(), 3);
    let comments: Vec<&str> = reviews.iter().map(|r| r["comment"].as_str().unwrap()).collect();
    assert_eq!(comments, vec!["review 0", "review 1", "review 2"]);
}

#[tokio::test]
async fn review_mutation_enforces_ownership() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "nina", "nina@example.com", "password1").await;
    register(&client, &app, "omar", "omar@example.com", "password1").await;
    let owner = login(&client, &app, "nina", "password1").await;
    let intruder = login(&client, &app, "omar", "password1").await;
    let admin = admin_token(&client, &app).await;

    let book = create_book(&client, &app, &owner, "Dune", "Frank Herbert").await;
    let book_id = book["id"].as_str().unwrap().to_string();
    let review: Value = add_review(&client, &app, &owner, &book_id, "mine", 4)
        .await
        .json()
        .await
        .unwrap();
    let review_id = review["id"].as_str().unwrap().to_string();
    let url = format!(
        "{}/api/books/{}/reviews/{}",
        app.address, book_id, review_id
    );

    // A non-owner, non-admin principal is Forbidden — not NotFound.
    let resp = client
        .put(&url)
        .bearer_auth(&intruder)
        .json(&json!({ "comment": "hijacked", "rating": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(&url)
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // The owner may update; the author linkage stays put and updatedAt moves.
    let resp = client
        .put(&url)
        .bearer_auth(&owner)
        .json(&json!({ "comment": "revised", "rating": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["comment"], "revised");
    assert_eq!(updated["rating"], 2);
    assert_eq!(updated["reviewerName"], "nina");
    assert_eq!(updated["userId"], review["userId"]);
    assert_eq!(updated["createdAt"], review["createdAt"]);

    // An admin may update someone else's review.
    let resp = client
        .put(&url)
        .bearer_auth(&admin)
        .json(&json!({ "comment": "moderated", "rating": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The owner may delete; the review is then gone.
    let resp = client.delete(&url).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client
        .delete(&url)
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn average_rating_matches_arithmetic_mean() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    register(&client, &app, "pete", "pete@example.com", "password1").await;
    let token = login(&client, &app, "pete", "password1").await;

    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();
    let url = format!("{}/api/books/{}/average-rating", app.address, id);

    // No reviews: exactly 0.0, not an error.
    let avg: f64 = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(avg, 0.0);

    for rating in [3, 4, 5, 2] {
        add_review(&client, &app, &token, &id, "r", rating).await;
    }
    let avg: f64 = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(avg, 3.5);

    // Unknown book: 404.
    let resp = client
        .get(format!(
            "{}/api/books/{}/average-rating",
            app.address,
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// --- End-to-End Scenarios ---

#[tokio::test]
async fn full_review_lifecycle_scenario() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Register user A, login A.
    register(&client, &app, "usera", "usera@example.com", "password1").await;
    let token = login(&client, &app, "usera", "password1").await;

    // Create book B, add r1(rating=5) and r2(rating=3) as A.
    let book = create_book(&client, &app, &token, "Dune", "Frank Herbert").await;
    let book_id = book["id"].as_str().unwrap().to_string();
    let r1: Value = add_review(&client, &app, &token, &book_id, "r1", 5)
        .await
        .json()
        .await
        .unwrap();
    add_review(&client, &app, &token, &book_id, "r2", 3).await;

    let avg_url = format!("{}/api/books/{}/average-rating", app.address, book_id);
    let avg: f64 = client.get(&avg_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(avg, 4.0);

    // Delete r1 as A; the average follows the current review set.
    let resp = client
        .delete(format!(
            "{}/api/books/{}/reviews/{}",
            app.address,
            book_id,
            r1["id"].as_str().unwrap()
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let avg: f64 = client.get(&avg_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(avg, 3.0);
}

#[tokio::test]
async fn admin_book_removal_scenario() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &app).await;

    // The admin creates a book (any authenticated role may) and then deletes it.
    let book = create_book(&client, &app, &admin, "Dune", "Frank Herbert").await;
    let id = book["id"].as_str().unwrap().to_string();

    let resp = client
        .delete(format!("{}/api/books/{}", app.address, id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/api/books/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
