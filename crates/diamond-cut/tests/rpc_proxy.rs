use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use diamond_abi::codec::{FACETS_SELECTOR, decode_diamond_cut, encode_facets, encode_revert_reason};
use diamond_abi::{Address, Selector};
use diamond_cut::proxy::RoutingTable;
use diamond_cut::{
    ApplyOptions, CutError, DiamondProxy, FacetDescriptor, PlannerOptions, ProxyError, RpcProxy,
    apply_cut, plan_cut, read_snapshot,
};
use serde_json::{Value, json};

const PROXY: Address = Address::new([0xdd; 20]);

#[derive(Default)]
struct Chain {
    table: RoutingTable,
    sent: Vec<Value>,
    receipt_polls: usize,
    revert_next: Option<String>,
    receipt_status: Option<&'static str>,
}

type Shared = Arc<Mutex<Chain>>;

fn hex_bytes(value: &Value) -> Vec<u8> {
    let s = value.as_str().unwrap();
    hex::decode(s.trim_start_matches("0x")).unwrap()
}

async fn rpc(State(chain): State<Shared>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let params = &req["params"];
    let mut chain = chain.lock().unwrap();
    let result = match req["method"].as_str().unwrap() {
        "eth_call" => {
            let data = hex_bytes(&params[0]["data"]);
            assert_eq!(&data[..4], FACETS_SELECTOR.as_bytes());
            json!(format!("0x{}", hex::encode(encode_facets(&chain.table.loupe()))))
        }
        "eth_sendTransaction" => {
            chain.sent.push(params[0].clone());
            if let Some(reason) = chain.revert_next.take() {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": 3,
                        "message": "execution reverted",
                        "data": format!("0x{}", hex::encode(encode_revert_reason(&reason))),
                    }
                }));
            }
            let call = decode_diamond_cut(&hex_bytes(&params[0]["data"])).unwrap();
            let mut next = chain.table.clone();
            for action in &call.actions {
                next.apply(PROXY, action).unwrap();
            }
            chain.table = next;
            json!(format!("0x{:064x}", chain.sent.len()))
        }
        "eth_getTransactionReceipt" => {
            chain.receipt_polls += 1;
            if chain.receipt_polls == 1 {
                Value::Null
            } else {
                json!({
                    "transactionHash": params[0],
                    "status": chain.receipt_status.unwrap_or("0x1"),
                    "blockNumber": "0x10",
                    "gasUsed": "0x5208",
                })
            }
        }
        other => panic!("unexpected method {other}"),
    };
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn start_chain(chain: Shared) -> SocketAddr {
    let app = Router::new().route("/", post(rpc)).with_state(chain);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn proxy_for(addr: SocketAddr) -> RpcProxy {
    RpcProxy::new(&format!("http://{addr}/"), PROXY)
        .unwrap()
        .with_sender(Address::new([0x01; 20]))
        .with_poll_interval(Duration::from_millis(10))
}

fn facet(address: u8, sigs: &[&str]) -> FacetDescriptor {
    FacetDescriptor::new(
        "Facet",
        Some(Address::new([address; 20])),
        sigs.iter().map(|s| Selector::of_signature(s)),
    )
}

#[tokio::test]
async fn cut_round_trips_through_json_rpc() {
    let chain: Shared = Arc::default();
    let addr = start_chain(chain.clone()).await;
    let proxy = proxy_for(addr);
    let timeout = Duration::from_secs(5);

    let live = read_snapshot(&proxy, timeout).await.unwrap();
    assert!(live.is_empty());

    let target = [facet(0xa1, &["owner()", "transferOwnership(address)"])];
    let plan = plan_cut(&live, &target, &PlannerOptions::default()).unwrap();
    let report = apply_cut(&proxy, &plan, None, &ApplyOptions::default())
        .await
        .unwrap();
    let receipt = report.receipt.unwrap();
    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(receipt.gas_used, Some(21000));

    let chain = chain.lock().unwrap();
    assert_eq!(chain.receipt_polls, 2, "null receipt must be polled again");
    assert_eq!(chain.sent[0]["to"], json!(PROXY.to_hex()));
    assert!(chain.sent[0].get("gas").is_none(), "gas is left to the node");
    assert_eq!(
        chain.table.owner(&Selector::of_signature("owner()")),
        Some(Address::new([0xa1; 20]))
    );
}

#[tokio::test]
async fn revert_reason_is_surfaced() {
    let chain: Shared = Arc::default();
    chain.lock().unwrap().revert_next = Some("LibDiamond: Must be contract owner".into());
    let addr = start_chain(chain.clone()).await;
    let proxy = proxy_for(addr);

    let plan = plan_cut(
        &read_snapshot(&proxy, Duration::from_secs(5)).await.unwrap(),
        &[facet(0xa1, &["owner()"])],
        &PlannerOptions::default(),
    )
    .unwrap();
    match apply_cut(&proxy, &plan, None, &ApplyOptions::default()).await {
        Err(CutError::Proxy(ProxyError::Rpc { message, .. })) => {
            assert!(message.contains("Must be contract owner"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(chain.lock().unwrap().table.is_empty());
}

async fn cut_with_receipt_status(status: &'static str) -> CutError {
    let chain: Shared = Arc::default();
    chain.lock().unwrap().receipt_status = Some(status);
    let addr = start_chain(chain).await;
    let proxy = proxy_for(addr);

    let plan = plan_cut(
        &read_snapshot(&proxy, Duration::from_secs(5)).await.unwrap(),
        &[facet(0xa1, &["owner()"])],
        &PlannerOptions::default(),
    )
    .unwrap();
    apply_cut(&proxy, &plan, None, &ApplyOptions::default())
        .await
        .unwrap_err()
}

#[tokio::test]
async fn failed_receipt_status_is_a_revert() {
    match cut_with_receipt_status("0x0").await {
        CutError::Proxy(ProxyError::Reverted { tx, reason }) => {
            assert_eq!(tx, format!("0x{:064x}", 1));
            assert_eq!(reason, None);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unparsable_receipt_status_is_a_decode_error() {
    match cut_with_receipt_status("0xnope").await {
        CutError::Proxy(ProxyError::Decode(message)) => {
            assert!(message.contains("0xnope"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn submitting_without_sender_fails() {
    let chain: Shared = Arc::default();
    let addr = start_chain(chain).await;
    let proxy = RpcProxy::new(&format!("http://{addr}/"), PROXY).unwrap();
    let err = proxy.submit_cut(&[], None).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoSender));
}
