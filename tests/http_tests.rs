//! End-to-end HTTP tests over the in-memory backends

use axum::http::StatusCode;
use axum_test::TestServer;
use order_api::prelude::*;

fn create_test_server() -> (TestServer, InMemoryOrderStore, InMemoryOrderIndex) {
    let store = InMemoryOrderStore::new();
    let index = InMemoryOrderIndex::new();

    let app = ServerBuilder::new()
        .with_store(store.clone())
        .with_index(index.clone())
        .build()
        .expect("Failed to build app");

    let server = TestServer::try_new(app).expect("Failed to create test server");
    (server, store, index)
}

async fn create_order(server: &TestServer, status: &str, city: &str) -> String {
    let response = server
        .post("/api/orders")
        .json(&json!({
            "userId": "u1",
            "status": status,
            "city": city,
            "addressDetail": "Harbour Street 4",
            "lineItems": [
                {"name": "A", "quantity": 2, "price": 5.0},
                {"name": "B", "quantity": 1, "price": 3.0}
            ]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["id"].as_str().expect("id in response").to_string()
}

// =============================================================================
// Health
// =============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _, _) = create_test_server();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "order-api");
    }
}

// =============================================================================
// Orders
// =============================================================================

mod order_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_list() {
        let (server, _, index) = create_test_server();
        let id = create_order(&server, "Shipped", "Izmir").await;
        assert!(index.contains(&id));

        let response = server.get("/api/orders").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["totalItemCount"], 1);
        let order = &body["data"][0];
        assert_eq!(order["id"], id.as_str());
        assert_eq!(order["total"], 13.0);
        assert_eq!(order["createdAt"], order["updatedAt"]);
        assert_eq!(order["lineItems"][1]["unitPrice"], 3.0);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (server, _, _) = create_test_server();

        let body: Value = server.get("/api/orders").await.json();
        assert_eq!(body, json!({ "totalItemCount": 0, "data": [] }));
    }

    #[tokio::test]
    async fn test_create_with_malformed_body_is_bad_request() {
        let (server, store, _) = create_test_server();

        let response = server
            .post("/api/orders")
            .text("{oops")
            .content_type("application/json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let (server, store, index) = create_test_server();
        let id = create_order(&server, "Shipped", "Izmir").await;

        let response = server.delete(&format!("/api/orders/{}", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "id": id, "success": true }));
        assert!(store.is_empty());
        assert!(!index.contains(&id));

        let response = server.delete(&format!("/api/orders/{}", id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["details"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_reconcile_restores_index_entry() {
        let (server, _, index) = create_test_server();
        let id = create_order(&server, "Shipped", "Izmir").await;
        index.delete(&id).await.unwrap();

        let response = server.post(&format!("/api/orders/{}/reconcile", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "id": id, "outcome": "reindexed" }));
        assert!(index.contains(&id));
    }
}

// =============================================================================
// Filtering
// =============================================================================

mod filter_tests {
    use super::*;

    async fn seeded() -> TestServer {
        let (server, _, _) = create_test_server();
        create_order(&server, "Shipped", "Izmir").await;
        create_order(&server, "Delivered", "Ankara").await;
        create_order(&server, "Pending", "Izmir").await;
        server
    }

    #[tokio::test]
    async fn test_filter_on_both_backends() {
        let server = seeded().await;
        let req = json!({
            "exact_filters": { "status": ["Shipped", "Delivered"] },
            "fields": ["id", "status"],
            "sort": [{ "field": "status", "direction": "asc" }]
        });

        for path in ["/api/orders/filter/store", "/api/orders/filter/index"] {
            let response = server.post(path).json(&req).await;
            response.assert_status_ok();

            let body: Value = response.json();
            assert_eq!(body["totalItemCount"], 2, "{}", path);
            assert_eq!(body["data"][0]["status"], "Delivered");
            assert_eq!(body["data"][1]["status"], "Shipped");
            assert_eq!(body["data"][0]["city"], "");
        }
    }

    #[tokio::test]
    async fn test_legacy_aliases() {
        let server = seeded().await;
        let req = json!({ "exactFilters": { "city": "Izmir" } });

        for path in [
            "/api/orders/GenericEndpoint",
            "/api/orders/GenericEndpointElastic",
        ] {
            let body: Value = server.post(path).json(&req).await.json();
            assert_eq!(body["totalItemCount"], 2, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_zero_rows_is_ok() {
        let server = seeded().await;
        let response = server
            .post("/api/orders/filter/index")
            .json(&json!({ "exact_filters": { "status": "Lost" } }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["totalItemCount"], 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_bad_request() {
        let server = seeded().await;

        let cases = [
            ("/api/orders/filter/store", json!({ "exact_filters": { "status": [] } })),
            ("/api/orders/filter/index", json!({ "sort": { "total": "sideways" } })),
            ("/api/orders/filter/index", json!({ "match": { "$where": "1" } })),
            ("/api/orders/filter/cache", json!({})),
        ];

        for (path, req) in cases {
            let response = server.post(path).json(&req).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = response.json();
            assert_eq!(body["code"], "BAD_REQUEST", "{} {}", path, req);
        }
    }
}
