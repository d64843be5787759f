use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use tokopos_auth::{JwtClaims, PrincipalId, Role};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = tokopos_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, roles: Vec<Role>) -> String {
    mint_jwt_for(jwt_secret, PrincipalId::new(), roles)
}

fn mint_jwt_for(jwt_secret: &str, sub: PrincipalId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_eventually(
    client: &reqwest::Client,
    token: &str,
    url: String,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection update).
    // Poll briefly until the projection catches up.
    for _ in 0..50 {
        let res = client.get(&url).bearer_auth(token).send().await.unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("resource did not become visible in projection within timeout: {url}");
}

async fn register_product(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    sku: &str,
) -> String {
    let res = client
        .post(format!("{}/products", base_url))
        .bearer_auth(token)
        .json(&json!({
            "sku": sku,
            "name": "Kopi Susu Botol",
            "category": "beverage",
            "price_cents": 15000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

async fn produce(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    id: &str,
    quantity: i64,
) {
    let res = client
        .post(format!("{}/products/{}/adjustments", base_url, id))
        .bearer_auth(token)
        .json(&json!({
            "adjustment_type": "production",
            "quantity": quantity,
            "condition": "good",
            "source_location": "production",
            "target_location": "storage",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn product_lifecycle_register_adjust_query() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-001").await;

    produce(&client, &srv.base_url, &token, &id, 100).await;

    // Move 30 to the cashier, take 10 back.
    let res = client
        .post(format!("{}/products/{}/adjustments", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "adjustment_type": "distribution",
            "quantity": 30,
            "condition": "good",
            "source_location": "storage",
            "target_location": "cashier",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/products/{}/adjustments", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "adjustment_type": "return",
            "quantity": 10,
            "condition": "good",
            "source_location": "cashier",
            "target_location": "storage",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Query (eventually consistent with projection)
    let product = get_eventually(
        &client,
        &token,
        format!("{}/products/{}", srv.base_url, id),
    )
    .await;
    assert_eq!(product["sku"], "KOPI-001");
    assert_eq!(product["stock"]["storage"], 70);
    assert_eq!(product["stock"]["distribution"], 20);
    assert_eq!(product["stock"]["returned"], 10);
    assert_eq!(product["stock"]["total"], 100);

    // Filtered adjustment history
    let history = get_eventually(
        &client,
        &token,
        format!(
            "{}/adjustments?product_id={}&type=distribution",
            srv.base_url, id
        ),
    )
    .await;
    let items = history["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 30);
}

#[tokio::test]
async fn overdraw_is_rejected_with_conflict() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-002").await;
    produce(&client, &srv.base_url, &token, &id, 5).await;

    let res = client
        .post(format!("{}/products/{}/adjustments", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "adjustment_type": "distribution",
            "quantity": 6,
            "condition": "good",
            "source_location": "storage",
            "target_location": "cashier",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
}

#[tokio::test]
async fn unauthorized_access_blocked_for_commands() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    // Not admin => permission mapping grants no catalog writes => forbidden.
    let token = mint_jwt(jwt_secret, vec![Role::new("viewer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/products", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "sku": "X", "name": "Widget", "price_cents": 100 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cashier_cannot_register_products_but_can_advance() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, vec![Role::admin()]);
    let cashier = mint_jwt(jwt_secret, vec![Role::cashier()]);

    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/products", srv.base_url))
        .bearer_auth(&cashier)
        .json(&json!({ "sku": "X", "name": "Widget", "price_cents": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Admin sets up product + distribution; cashier confirms receipt.
    let id = register_product(&client, &srv.base_url, &admin, "KOPI-003").await;
    produce(&client, &srv.base_url, &admin, &id, 50).await;

    let res = client
        .post(format!("{}/distributions", srv.base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "product_id": id,
            "quantity": 20,
            "cashier_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let dist_id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/distributions/{}/advance", srv.base_url, dist_id))
        .bearer_auth(&cashier)
        .json(&json!({ "to": "distributed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn distribution_workflow_create_advance_complete() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-004").await;
    produce(&client, &srv.base_url, &token, &id, 50).await;

    let res = client
        .post(format!("{}/distributions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": id,
            "quantity": 20,
            "cashier_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let dist_id = created["id"].as_str().unwrap().to_string();

    // The hand-off moved stock out of storage immediately.
    let product = get_eventually(
        &client,
        &token,
        format!("{}/products/{}", srv.base_url, id),
    )
    .await;
    assert_eq!(product["stock"]["storage"], 30);
    assert_eq!(product["stock"]["distribution"], 20);

    let dist = get_eventually(
        &client,
        &token,
        format!("{}/distributions/{}", srv.base_url, dist_id),
    )
    .await;
    assert_eq!(dist["status"], "pending");

    // Statuses must be walked one step at a time.
    let res = client
        .post(format!("{}/distributions/{}/advance", srv.base_url, dist_id))
        .bearer_auth(&token)
        .json(&json!({ "to": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for to in ["distributed", "completed"] {
        let res = client
            .post(format!("{}/distributions/{}/advance", srv.base_url, dist_id))
            .bearer_auth(&token)
            .json(&json!({ "to": to }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    // Completed hand-offs cannot be cancelled.
    let res = client
        .post(format!("{}/distributions/{}/cancel", srv.base_url, dist_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn cancelling_pending_distribution_restores_storage() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-005").await;
    produce(&client, &srv.base_url, &token, &id, 50).await;

    let res = client
        .post(format!("{}/distributions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": id,
            "quantity": 20,
            "cashier_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let dist_id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/distributions/{}/cancel", srv.base_url, dist_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Reserved stock is back in storage.
    for _ in 0..50 {
        let product = get_eventually(
            &client,
            &token,
            format!("{}/products/{}", srv.base_url, id),
        )
        .await;
        if product["stock"]["storage"] == 50 {
            assert_eq!(product["stock"]["distribution"], 0);

            // The reversal shows up in the ledger.
            let history = get_eventually(
                &client,
                &token,
                format!("{}/adjustments?product_id={}", srv.base_url, id),
            )
            .await;
            let reversals = history["items"]
                .as_array()
                .unwrap()
                .iter()
                .filter(|r| r["reversal"] == true)
                .count();
            assert_eq!(reversals, 1);
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("stock reversal did not reach the read model within timeout");
}

#[tokio::test]
async fn creating_distribution_beyond_storage_fails_cleanly() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-006").await;
    produce(&client, &srv.base_url, &token, &id, 10).await;

    let res = client
        .post(format!("{}/distributions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": id,
            "quantity": 11,
            "cashier_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Nothing moved and no workflow record was created.
    let product = get_eventually(
        &client,
        &token,
        format!("{}/products/{}", srv.base_url, id),
    )
    .await;
    assert_eq!(product["stock"]["storage"], 10);

    let list = get_eventually(&client, &token, format!("{}/distributions", srv.base_url)).await;
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_is_refused_when_reserved_stock_already_returned() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "KOPI-007").await;
    produce(&client, &srv.base_url, &token, &id, 50).await;

    let res = client
        .post(format!("{}/distributions", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "product_id": id,
            "quantity": 30,
            "cashier_id": uuid::Uuid::now_v7().to_string(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let dist_id = created["id"].as_str().unwrap().to_string();

    // The cashier hands everything back as a return before the
    // distribution is cancelled, so the distribution bucket is empty.
    let res = client
        .post(format!("{}/products/{}/adjustments", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({
            "adjustment_type": "return",
            "quantity": 30,
            "condition": "good",
            "source_location": "cashier",
            "target_location": "storage",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Cancelling now cannot reverse the stock, so the cancel must be
    // refused outright rather than leaving a cancelled record with no
    // reversal behind it.
    let res = client
        .post(format!("{}/distributions/{}/cancel", srv.base_url, dist_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    // The workflow record is untouched.
    let dist = get_eventually(
        &client,
        &token,
        format!("{}/distributions/{}", srv.base_url, dist_id),
    )
    .await;
    assert_eq!(dist["status"], "pending");

    // And so are the buckets: 50 produced, 30 distributed, 30 returned.
    for _ in 0..50 {
        let product = get_eventually(
            &client,
            &token,
            format!("{}/products/{}", srv.base_url, id),
        )
        .await;
        if product["stock"]["returned"] == 30 {
            assert_eq!(product["stock"]["storage"], 20);
            assert_eq!(product["stock"]["distribution"], 0);
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("return adjustment did not reach the read model within timeout");
}

#[tokio::test]
async fn adjustments_listing_without_product_filter_spans_products() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let first = register_product(&client, &srv.base_url, &token, "KOPI-008").await;
    let second = register_product(&client, &srv.base_url, &token, "TEH-001").await;
    produce(&client, &srv.base_url, &token, &first, 10).await;
    produce(&client, &srv.base_url, &token, &second, 20).await;

    for _ in 0..50 {
        let history =
            get_eventually(&client, &token, format!("{}/adjustments", srv.base_url)).await;
        let items = history["items"].as_array().unwrap();
        if items.len() == 2 {
            let product_ids: Vec<&str> =
                items.iter().map(|r| r["product_id"].as_str().unwrap()).collect();
            assert!(product_ids.contains(&first.as_str()));
            assert!(product_ids.contains(&second.as_str()));
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("adjustments did not reach the read model within timeout");
}

#[tokio::test]
async fn duplicate_sku_is_rejected_with_conflict() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let token = mint_jwt(jwt_secret, vec![Role::admin()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &token, "DUP-001").await;

    // Wait for the first product to land in the read model; the
    // uniqueness check consults it.
    get_eventually(&client, &token, format!("{}/products/{}", srv.base_url, id)).await;

    let res = client
        .post(format!("{}/products", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "sku": "DUP-001",
            "name": "Kopi Susu Botol (second batch)",
            "price_cents": 16000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "sku_taken");

    // Still exactly one product in the catalog.
    let list = get_eventually(&client, &token, format!("{}/products", srv.base_url)).await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cashier_listing_is_scoped_to_own_distributions() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let admin = mint_jwt(jwt_secret, vec![Role::admin()]);

    let cashier_sub = PrincipalId::new();
    let cashier = mint_jwt_for(jwt_secret, cashier_sub, vec![Role::cashier()]);

    let client = reqwest::Client::new();
    let id = register_product(&client, &srv.base_url, &admin, "KOPI-009").await;
    produce(&client, &srv.base_url, &admin, &id, 50).await;

    // One hand-off to our cashier, one to somebody else's till.
    for cashier_id in [cashier_sub.to_string(), uuid::Uuid::now_v7().to_string()] {
        let res = client
            .post(format!("{}/distributions", srv.base_url))
            .bearer_auth(&admin)
            .json(&json!({
                "product_id": id,
                "quantity": 10,
                "cashier_id": cashier_id,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    // Admin sees both; the cashier only their own.
    for _ in 0..50 {
        let all = get_eventually(&client, &admin, format!("{}/distributions", srv.base_url)).await;
        if all["items"].as_array().unwrap().len() == 2 {
            let own =
                get_eventually(&client, &cashier, format!("{}/distributions", srv.base_url))
                    .await;
            let items = own["items"].as_array().unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0]["cashier_id"], cashier_sub.to_string());
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("distributions did not reach the read model within timeout");
}
