//! End-to-end zone synchronisation against in-process gateway and chain node

use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use dns_chain::{LogRecord, ZONEHASH_CHANGED_TOPIC};
use dns_core::{namehash, Address, DnsError, NodeHash};
use dns_server::{
    Config, EventDispatcher, OriginPolicy, PipelineOutcome, ZoneSyncPipeline, ZoneSyncServer,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

const ZONE: &str = r#"$TTL    86400
$ORIGIN example.com.
@  1D  IN  SOA ns1.example.com. hostmaster.example.com. (2019123101 3H 15 1w 3h)
       IN  NS     ns1.example.com.
www    IN  A      192.0.2.10
"#;

const RESOLVER: Address = Address([0x4a; 20]);

fn contenthash() -> Vec<u8> {
    hex::decode("e3010170122029f2d17be6139079dc48696d1f582a8530eb9805b561eda517e22a892c7e3f1f")
        .unwrap()
}

fn abi_bytes_pair(previous: &[u8], new: &[u8]) -> Bytes {
    fn word(value: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&(value as u64).to_be_bytes());
        word
    }
    fn padded(data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        out.resize(data.len().div_ceil(32) * 32, 0);
        out
    }

    let mut payload = Vec::new();
    payload.extend_from_slice(&word(64));
    payload.extend_from_slice(&word(96 + padded(previous).len()));
    payload.extend_from_slice(&word(previous.len()));
    payload.extend_from_slice(&padded(previous));
    payload.extend_from_slice(&word(new.len()));
    payload.extend_from_slice(&padded(new));
    Bytes::from(payload)
}

fn zonehash_log(emitter: Address, node: NodeHash, previous: &[u8], new: &[u8]) -> LogRecord {
    LogRecord {
        address: emitter,
        topics: vec![ZONEHASH_CHANGED_TOPIC, node],
        data: abi_bytes_pair(previous, new),
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Harness {
    config: Config,
    _output: TempDir,
}

impl Harness {
    async fn start(zone: &'static str, policy: OriginPolicy) -> Self {
        let gateway = serve(Router::new().route("/ipfs/:cid", get(move || async move { zone }))).await;
        let chain = serve(Router::new().route(
            "/",
            post(|Json(request): Json<Value>| async move {
                let result = format!("0x{}{}", "00".repeat(12), hex::encode(RESOLVER.as_bytes()));
                Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
            }),
        ))
        .await;

        let output = TempDir::new().unwrap();
        let mut config = Config::default();
        config.chain.endpoint = chain;
        config.gateway.base_url = format!("{}/", gateway);
        config.storage.output_dir = output.path().to_path_buf();
        config.pipeline.origin_policy = policy;
        config.validate().unwrap();

        Self {
            config,
            _output: output,
        }
    }

    fn pipeline(&self) -> ZoneSyncPipeline {
        ZoneSyncPipeline::new(&self.config).unwrap()
    }

    fn zone_path(&self) -> std::path::PathBuf {
        self.config.storage.output_dir.join("db.example.com")
    }
}

#[tokio::test]
async fn test_update_writes_fetched_zone_verbatim() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = harness.pipeline();

    let log = zonehash_log(RESOLVER, namehash("example.com").unwrap(), b"", &contenthash());
    let event = pipeline.decode(&log).unwrap().unwrap();
    let outcome = pipeline.process(&event).await.unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Written {
            domain: "example.com".to_string(),
            path: harness.zone_path(),
        }
    );
    assert_eq!(std::fs::read(harness.zone_path()).unwrap(), ZONE.as_bytes());

    let stats = pipeline.get_statistics();
    assert_eq!(stats.updates, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn test_removal_deletes_zone_and_tolerates_missing_file() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = harness.pipeline();
    std::fs::write(harness.zone_path(), ZONE).unwrap();

    let log = zonehash_log(RESOLVER, namehash("example.com").unwrap(), &contenthash(), b"");
    let event = pipeline.decode(&log).unwrap().unwrap();

    let outcome = pipeline.process(&event).await.unwrap();
    assert_eq!(
        outcome,
        PipelineOutcome::Removed {
            domain: "example.com".to_string(),
            existed: true,
        }
    );
    assert!(!harness.zone_path().exists());

    let outcome = pipeline.process(&event).await.unwrap();
    assert_eq!(
        outcome,
        PipelineOutcome::Removed {
            domain: "example.com".to_string(),
            existed: false,
        }
    );

    let stats = pipeline.get_statistics();
    assert_eq!(stats.removals, 2);
    assert_eq!(stats.commits, 2);
}

#[tokio::test]
async fn test_foreign_emitter_rejected_when_enforcing() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = harness.pipeline();

    let log = zonehash_log(Address([0x01; 20]), namehash("example.com").unwrap(), b"", &contenthash());
    let event = pipeline.decode(&log).unwrap().unwrap();

    let result = pipeline.process(&event).await;
    assert!(matches!(result, Err(DnsError::OriginRejected { .. })));
    assert!(!harness.zone_path().exists());
    assert_eq!(pipeline.get_statistics().origin_rejections, 1);
}

#[tokio::test]
async fn test_foreign_removal_rejected_when_enforcing() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = harness.pipeline();
    std::fs::write(harness.zone_path(), ZONE).unwrap();

    let log = zonehash_log(Address([0x01; 20]), namehash("example.com").unwrap(), &contenthash(), b"");
    let event = pipeline.decode(&log).unwrap().unwrap();

    let result = pipeline.process(&event).await;
    assert!(matches!(result, Err(DnsError::OriginRejected { .. })));
    assert_eq!(std::fs::read(harness.zone_path()).unwrap(), ZONE.as_bytes());

    let stats = pipeline.get_statistics();
    assert_eq!(stats.removals, 1);
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.origin_rejections, 1);
}

#[tokio::test]
async fn test_foreign_emitter_committed_when_warning() {
    let harness = Harness::start(ZONE, OriginPolicy::Warn).await;
    let pipeline = harness.pipeline();

    let log = zonehash_log(Address([0x01; 20]), namehash("example.com").unwrap(), b"", &contenthash());
    let event = pipeline.decode(&log).unwrap().unwrap();

    assert!(pipeline.process(&event).await.is_ok());
    assert_eq!(std::fs::read(harness.zone_path()).unwrap(), ZONE.as_bytes());
}

#[tokio::test]
async fn test_zone_for_other_domain_is_not_committed() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = harness.pipeline();

    let log = zonehash_log(RESOLVER, namehash("other.com").unwrap(), b"", &contenthash());
    let event = pipeline.decode(&log).unwrap().unwrap();

    let result = pipeline.process(&event).await;
    assert_eq!(
        result,
        Err(DnsError::OriginMismatch {
            zone: "example.com".to_string()
        })
    );
    assert!(!harness.zone_path().exists());
    assert_eq!(pipeline.get_statistics().failures, 1);
}

#[tokio::test]
async fn test_server_processes_newline_delimited_logs() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = Arc::new(harness.pipeline());
    let server = ZoneSyncServer::with_pipeline(pipeline.clone(), 4);

    let update = zonehash_log(RESOLVER, namehash("example.com").unwrap(), b"", &contenthash());
    let mut unrelated = update.clone();
    unrelated.topics[0] = NodeHash([0xaa; 32]);
    let empty = zonehash_log(RESOLVER, namehash("example.com").unwrap(), b"", b"");

    let input = [
        serde_json::to_string(&update).unwrap(),
        String::new(),
        "not json".to_string(),
        serde_json::to_string(&unrelated).unwrap(),
        serde_json::to_string(&empty).unwrap(),
    ]
    .join("\n");

    let stats = server.run_with_input(input.as_bytes()).await.unwrap();

    assert_eq!(stats.events_seen, 3);
    assert_eq!(stats.events_ignored, 1);
    assert_eq!(stats.updates, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(std::fs::read(harness.zone_path()).unwrap(), ZONE.as_bytes());
}

#[tokio::test]
async fn test_server_skips_undecodable_lines() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = Arc::new(harness.pipeline());
    let server = ZoneSyncServer::with_pipeline(pipeline.clone(), 4);

    let update = zonehash_log(RESOLVER, namehash("example.com").unwrap(), b"", &contenthash());
    let mut input = b"not json\n\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(serde_json::to_string(&update).unwrap().as_bytes());
    input.push(b'\n');

    let stats = server.run_with_input(input.as_slice()).await.unwrap();

    assert_eq!(stats.events_seen, 1);
    assert_eq!(stats.updates, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(std::fs::read(harness.zone_path()).unwrap(), ZONE.as_bytes());
}

#[tokio::test]
async fn test_dispatch_waits_for_a_free_permit() {
    let harness = Harness::start(ZONE, OriginPolicy::Enforce).await;
    let pipeline = Arc::new(harness.pipeline());
    let mut dispatcher = EventDispatcher::new(pipeline.clone(), 1);

    let update = zonehash_log(RESOLVER, namehash("example.com").unwrap(), b"", &contenthash());
    dispatcher.dispatch(update.clone()).await;
    assert!(dispatcher.in_flight() <= 1);

    // The second event only starts once the first has released its permit
    dispatcher.dispatch(update).await;
    assert_eq!(pipeline.get_statistics().commits, 1);
    assert!(dispatcher.in_flight() <= 1);

    dispatcher.drain().await;
    assert_eq!(dispatcher.in_flight(), 0);
    assert_eq!(pipeline.get_statistics().commits, 2);
}
