use serde_json::{json, Value};

use rsa_engine::api::{ApiContext, ApiRequest, Router};
use rsa_engine::ServiceConfig;

fn router() -> Router {
    Router::new(ApiContext::new(ServiceConfig::default().with_bit_length_range(64, 512)))
}

fn request(method: &str, path: &str, session: Option<&str>, body: Option<Value>) -> ApiRequest {
    ApiRequest {
        id: Some(json!(7)),
        method: method.to_string(),
        path: path.to_string(),
        session_id: session.map(str::to_string),
        body,
    }
}

async fn call(router: &Router, method: &str, path: &str, session: Option<&str>, body: Option<Value>) -> (u16, Value) {
    let response = router.handle(request(method, path, session, body)).await;
    assert_eq!(response.id, Some(json!(7)));
    (response.status, response.body)
}

#[tokio::test]
async fn test_primes_keys_encrypt_decrypt() {
    let router = router();

    let (status, primes) = call(
        &router,
        "POST",
        "/api/primes/generate",
        None,
        Some(json!({"bit_length": 128, "miller_rabin_rounds": 10})),
    )
    .await;
    assert_eq!(status, 200, "{}", primes);
    assert_eq!(primes["bit_length"], 128);
    assert_ne!(primes["p"], primes["q"]);

    let (status, current) = call(&router, "GET", "/primes/current", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(current["status"], "primes_available");
    assert_eq!(current["p_bit_length"], 128);

    let (status, keys) = call(&router, "POST", "/keys/generate", None, None).await;
    assert_eq!(status, 200, "{}", keys);
    assert_eq!(keys["public_key"]["e"], "65537");
    let n = keys["public_key"]["n"].as_str().unwrap().to_string();
    let d = keys["private_key"]["d"].as_str().unwrap().to_string();

    let (status, encrypted) = call(
        &router,
        "POST",
        "/crypto/encrypt",
        None,
        Some(json!({"message": "Hello, World!", "n": n, "e": "65537"})),
    )
    .await;
    assert_eq!(status, 200, "{}", encrypted);
    assert_eq!(encrypted["message_length"], 13);
    assert_eq!(encrypted["block_info"][0]["block_number"], 1);

    let (status, decrypted) = call(
        &router,
        "POST",
        "/crypto/decrypt",
        None,
        Some(json!({
            "encrypted_blocks": encrypted["encrypted_blocks"],
            "n": n,
            "d": d,
            "byte_length": encrypted["byte_length"],
        })),
    )
    .await;
    assert_eq!(status, 200, "{}", decrypted);
    assert_eq!(decrypted["decrypted_message"], "Hello, World!");
    assert_eq!(decrypted["success"], true);

    let (status, validation) = call(&router, "POST", "/keys/validate", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(validation["is_valid"], true);
}

#[tokio::test]
async fn test_stored_key_round_trip() {
    let router = router();
    call(&router, "POST", "/primes/generate", None, Some(json!({"bit_length": 64}))).await;
    let (status, _) = call(&router, "POST", "/keys/generate", None, Some(json!({}))).await;
    assert_eq!(status, 200);

    let (status, encrypted) = call(
        &router,
        "POST",
        "/crypto/encrypt-with-stored-keys",
        None,
        Some(json!({"message": "stored keys"})),
    )
    .await;
    assert_eq!(status, 200, "{}", encrypted);

    let (status, decrypted) = call(
        &router,
        "POST",
        "/crypto/decrypt-with-stored-keys",
        None,
        Some(json!({
            "encrypted_blocks": encrypted["encrypted_blocks"],
            "byte_length": encrypted["byte_length"],
        })),
    )
    .await;
    assert_eq!(status, 200, "{}", decrypted);
    assert_eq!(decrypted["decrypted_message"], "stored keys");
}

#[tokio::test]
async fn test_new_primes_clear_keys() {
    let router = router();
    call(&router, "POST", "/primes/generate", None, Some(json!({"bit_length": 64}))).await;
    call(&router, "POST", "/keys/generate", None, None).await;
    let (_, current) = call(&router, "GET", "/keys/current", None, None).await;
    assert_eq!(current["status"], "keys_available");
    assert_eq!(current["key_info"]["is_valid"], true);

    call(&router, "POST", "/primes/generate", None, Some(json!({"bit_length": 64}))).await;
    let (_, current) = call(&router, "GET", "/keys/current", None, None).await;
    assert_eq!(current["status"], "no_keys");

    let (status, err) = call(&router, "POST", "/crypto/encrypt-with-stored-keys", None, Some(json!({"message": "x"}))).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "missing_prerequisite");

    let (status, _) = call(&router, "DELETE", "/primes/clear", None, None).await;
    assert_eq!(status, 200);
    let (_, current) = call(&router, "GET", "/primes/current", None, None).await;
    assert_eq!(current["status"], "no_primes");
}

#[tokio::test]
async fn test_invalid_prime_parameters() {
    let router = router();
    for body in [
        json!({"bit_length": 32}),
        json!({"bit_length": 100}),
        json!({"bit_length": 128, "miller_rabin_rounds": 0}),
        json!({"bit_length": "big"}),
    ] {
        let (status, err) = call(&router, "POST", "/primes/generate", None, Some(body)).await;
        assert_eq!(status, 400);
        assert_eq!(err["error"], "invalid_parameter");
        assert!(err["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_unknown_routes() {
    let router = router();
    let (status, err) = call(&router, "GET", "/nowhere", None, None).await;
    assert_eq!(status, 404);
    assert_eq!(err["error"], "not_found");

    let (status, err) = call(&router, "GET", "/crypto/encrypt", None, None).await;
    assert_eq!(status, 405);
    assert_eq!(err["error"], "method_not_allowed");
}

#[tokio::test]
async fn test_health_endpoints() {
    let router = router();
    let (status, health) = call(&router, "GET", "/health/", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["primes_available"], false);

    let (status, ready) = call(&router, "GET", "/health/ready", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(ready["components"]["current_state"]["keys"], "not_generated");

    let (status, live) = call(&router, "get", "/health/live", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(live["status"], "alive");

    let (status, info) = call(&router, "GET", "/", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(info["status"], "running");
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let router = router();
    let (status, created) = call(&router, "POST", "/sessions", None, None).await;
    assert_eq!(status, 200);
    let session = created["session_id"].as_str().unwrap().to_string();

    call(&router, "POST", "/primes/generate", Some(&session), Some(json!({"bit_length": 64}))).await;

    let (_, mine) = call(&router, "GET", "/primes/current", Some(&session), None).await;
    assert_eq!(mine["status"], "primes_available");
    let (_, default) = call(&router, "GET", "/primes/current", None, None).await;
    assert_eq!(default["status"], "no_primes");
}

#[tokio::test]
async fn test_decrypt_with_wrong_modulus_fails() {
    let router = router();
    let (status, err) = call(
        &router,
        "POST",
        "/crypto/decrypt",
        None,
        Some(json!({"encrypted_blocks": ["5000"], "n": "3233", "d": "2753"})),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "invalid_block");
}

#[tokio::test]
async fn test_prime_generation_timeout() {
    let config = ServiceConfig::default().with_timeout(std::time::Duration::from_millis(1));
    let router = Router::new(ApiContext::new(config));
    let (status, err) = call(
        &router,
        "POST",
        "/primes/generate",
        None,
        Some(json!({"bit_length": 2048, "miller_rabin_rounds": 100})),
    )
    .await;
    assert_eq!(status, 504);
    assert_eq!(err["error"], "timeout");

    let (_, current) = call(&router, "GET", "/primes/current", None, None).await;
    assert_eq!(current["status"], "no_primes");
}

#[tokio::test]
async fn test_unknown_session_ids_rejected() {
    let router = router();
    for i in 0..20 {
        let session = format!("never-created-{}", i);
        let (status, err) =
            call(&router, "POST", "/primes/generate", Some(&session), Some(json!({"bit_length": 64}))).await;
        assert_eq!(status, 404);
        assert_eq!(err["error"], "session_not_found");

        let (status, _) = call(&router, "DELETE", "/primes/clear", Some(&session), None).await;
        assert_eq!(status, 404);
    }
    assert_eq!(router.context().store().session_count(), 1);
}

#[tokio::test]
async fn test_delete_session() {
    let router = router();
    let (_, created) = call(&router, "POST", "/sessions", None, None).await;
    let session = created["session_id"].as_str().unwrap().to_string();
    assert_eq!(router.context().store().session_count(), 2);

    let (status, _) = call(&router, "DELETE", "/sessions", Some(&session), None).await;
    assert_eq!(status, 200);
    assert_eq!(router.context().store().session_count(), 1);

    let (status, err) = call(&router, "GET", "/primes/current", Some(&session), None).await;
    assert_eq!(status, 404);
    assert_eq!(err["error"], "session_not_found");

    let (status, err) = call(&router, "DELETE", "/sessions", None, None).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "invalid_parameter");
}

#[tokio::test]
async fn test_handle_line() {
    let router = router();

    let response = router
        .handle_line(r#"{"id": "a1", "method": "POST", "path": "/crypto/encrypt", "body": {"message": "A", "n": "3233", "e": "17"}}"#)
        .await;
    assert_eq!(response.id, Some(json!("a1")));
    assert_eq!(response.status, 200);
    assert_eq!(response.body["encrypted_blocks"], json!(["2790"]));

    // valid JSON, but not a request: the id still comes back
    let response = router.handle_line(r#"{"id": 42, "path": "/health"}"#).await;
    assert_eq!(response.id, Some(json!(42)));
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "invalid_parameter");
    assert!(response.body["detail"].as_str().unwrap().contains("method"));

    let response = router.handle_line("not json at all").await;
    assert_eq!(response.id, None);
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "invalid_parameter");

    let serialized = serde_json::to_value(&response).unwrap();
    assert_eq!(serialized["id"], Value::Null);
    assert_eq!(serialized["status"], 400);
}
