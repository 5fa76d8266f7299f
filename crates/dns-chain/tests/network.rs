//! Gateway and JSON-RPC behaviour against in-process HTTP servers

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dns_chain::{
    ContentResolver, JsonRpcRegistry, OriginAttestor, ResolverRegistry, ENS_REGISTRY_ADDRESS,
};
use dns_core::{namehash, Address, DnsError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const ZONE: &str = "$TTL 3600\n$ORIGIN example.com.\n@ IN SOA ns1 hostmaster 1 2 3 4 5\n";
const CONTENTHASH: &str =
    "e3010170122029f2d17be6139079dc48696d1f582a8530eb9805b561eda517e22a892c7e3f1f";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn test_fetch_returns_body_verbatim() {
    let app = Router::new().route(
        "/ipfs/:cid",
        get(|Path(cid): Path<String>| async move {
            assert!(cid.starts_with('z'));
            ZONE
        }),
    );
    let gateway = serve(app).await;

    let resolver = ContentResolver::new(format!("{}/", gateway), timeout()).unwrap();
    let text = resolver.fetch(&hex::decode(CONTENTHASH).unwrap()).await.unwrap();
    assert_eq!(text, ZONE);
}

#[tokio::test]
async fn test_fetch_ignores_status_code() {
    let app = Router::new().route(
        "/ipfs/:cid",
        get(|| async { (StatusCode::NOT_FOUND, "not found") }),
    );
    let gateway = serve(app).await;

    let resolver = ContentResolver::new(gateway, timeout()).unwrap();
    let text = resolver.fetch(&hex::decode(CONTENTHASH).unwrap()).await.unwrap();
    assert_eq!(text, "not found");
}

#[tokio::test]
async fn test_fetch_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let resolver = ContentResolver::new(format!("http://{}", addr), timeout()).unwrap();
    let result = resolver.fetch(&hex::decode(CONTENTHASH).unwrap()).await;
    assert!(matches!(result, Err(DnsError::Fetch { .. })));
}

fn rpc_node(resolver: Address) -> Router {
    Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| async move {
            assert_eq!(request["method"], "eth_call");
            assert_eq!(request["params"][1], "latest");
            assert_eq!(
                request["params"][0]["to"],
                ENS_REGISTRY_ADDRESS.to_lowercase()
            );
            let data = request["params"][0]["data"].as_str().unwrap().to_string();
            assert!(data.starts_with("0x0178b8bf"));

            let result = format!("0x{}{}", "00".repeat(12), hex::encode(resolver.as_bytes()));
            Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
        }),
    )
}

#[tokio::test]
async fn test_registry_resolver_lookup() {
    let resolver = Address([0x5a; 20]);
    let endpoint = serve(rpc_node(resolver)).await;

    let registry = JsonRpcRegistry::ens(endpoint, timeout()).unwrap();
    let node = namehash("example.com").unwrap();
    assert_eq!(registry.resolver("example.com", &node).await.unwrap(), resolver);
}

#[tokio::test]
async fn test_attestation_over_rpc() {
    let resolver = Address([0x5a; 20]);
    let endpoint = serve(rpc_node(resolver)).await;
    let attestor = OriginAttestor::new(Arc::new(JsonRpcRegistry::ens(endpoint, timeout()).unwrap()));

    assert!(attestor.attest("example.com", resolver).await.unwrap().is_valid());
    assert!(!attestor.attest("example.com", Address([0x01; 20])).await.unwrap().is_valid());
}

#[tokio::test]
async fn test_unset_resolver_over_rpc() {
    let endpoint = serve(rpc_node(Address::ZERO)).await;
    let attestor = OriginAttestor::new(Arc::new(JsonRpcRegistry::ens(endpoint, timeout()).unwrap()));

    let result = attestor.attest("example.com", Address([0x01; 20])).await;
    assert!(matches!(result, Err(DnsError::ResolverLookup { .. })));
}

#[tokio::test]
async fn test_rpc_error_is_lookup_failure() {
    let app = Router::new().route(
        "/",
        post(|| async {
            Json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "execution reverted" }
            }))
        }),
    );
    let endpoint = serve(app).await;

    let registry = JsonRpcRegistry::ens(endpoint, timeout()).unwrap();
    let node = namehash("example.com").unwrap();
    match registry.resolver("example.com", &node).await {
        Err(DnsError::ResolverLookup { name, message }) => {
            assert_eq!(name, "example.com");
            assert!(message.contains("execution reverted"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
