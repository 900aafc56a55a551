use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use order_book_engine::{api::router, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = http_body_util::BodyExt::collect(res.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn two_instrument_app() -> Router {
    let state = AppState::new();
    state.registry.register("TESTEX", "FOO").await;
    state.registry.register("TESTEX", "BAR").await;
    router(state)
}

#[tokio::test]
async fn independent_instruments_have_independent_books() {
    let app = two_instrument_app().await;

    let foo = json!({
        "venue": "TESTEX", "symbol": "FOO", "direction": "buy",
        "orderType": "limit", "price": 10, "qty": 5, "account": "A",
    });
    let bar = json!({
        "venue": "TESTEX", "symbol": "BAR", "direction": "buy",
        "orderType": "limit", "price": 20, "qty": 7, "account": "A",
    });

    app.clone().oneshot(post("/orders", foo)).await.unwrap();
    app.clone().oneshot(post("/orders", bar)).await.unwrap();

    let res = app.clone().oneshot(get("/books/TESTEX/FOO")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let snap = body_json(res).await;
    assert_eq!(snap["bids"][0]["price"].as_i64(), Some(10));

    let res = app.oneshot(get("/books/TESTEX/BAR")).await.unwrap();
    let snap = body_json(res).await;
    assert_eq!(snap["bids"][0]["price"].as_i64(), Some(20));
}

#[tokio::test]
async fn order_ids_are_local_to_each_book() {
    let app = two_instrument_app().await;

    let foo = json!({
        "venue": "TESTEX", "symbol": "FOO", "direction": "buy",
        "orderType": "limit", "price": 10, "qty": 5, "account": "A",
    });
    let bar = json!({
        "venue": "TESTEX", "symbol": "BAR", "direction": "buy",
        "orderType": "limit", "price": 20, "qty": 7, "account": "A",
    });

    let foo_res = app.clone().oneshot(post("/orders", foo)).await.unwrap();
    let bar_res = app.oneshot(post("/orders", bar)).await.unwrap();

    let foo_order = body_json(foo_res).await;
    let bar_order = body_json(bar_res).await;
    assert_eq!(foo_order["id"], 0);
    assert_eq!(bar_order["id"], 0);
}

#[tokio::test]
async fn unregistered_instrument_rejected_at_http_boundary() {
    let app = two_instrument_app().await;
    let order = json!({
        "venue": "TESTEX", "symbol": "BAZ", "direction": "buy",
        "orderType": "limit", "price": 10, "qty": 5, "account": "A",
    });
    let res = app.oneshot(post("/orders", order)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
