//! End-to-end tests: gateway, session and tracker against a mock SMSC over TCP


use crate::client::{BindCredentials, Gateway, GatewayBuilder, KeepAliveConfig, SessionState};
use crate::datatypes::{CommandStatus, MessageState};
use crate::message::ConcatHeader;
use crate::store::{DeliveryStore, MemoryStore, StoreError};
use crate::{SendOutcome, SmppError};
use mock_smsc::{MockBehavior, MockSmsc};
use std::time::{Duration, Instant};

const MSISDN: &str = "06304988888";

fn gateway(smsc: &MockSmsc, store: &MemoryStore) -> Gateway<MemoryStore> {
    GatewayBuilder::new(
        "127.0.0.1",
        smsc.port(),
        BindCredentials::transceiver("test", "secret"),
    )
    .keep_alive(KeepAliveConfig::disabled())
    .response_timeout(Duration::from_secs(2))
    .delivery_timeout(Duration::from_secs(2))
    .build(store.clone())
}

async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Store whose writes take far longer than any send is allowed to
#[derive(Clone)]
struct SlowStore {
    delay: Duration,
    inner: MemoryStore,
}

impl DeliveryStore for SlowStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }
}

#[tokio::test]
async fn hello_world_is_delivered_and_flagged() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);

    gateway.connect().await.unwrap();
    assert_eq!(gateway.state(), SessionState::BoundTrx);

    let outcome = gateway.send(MSISDN, "Hello World!").await;
    assert_eq!(outcome, SendOutcome::success());

    let submits = smsc.submits();
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].destination.addr, MSISDN);
    assert_eq!(submits[0].registered_delivery, 1);
    eventually(|| store.get("smpp:is_sent/06304988888").as_deref() == Some("true")).await;
    eventually(|| store.get("smpp:is_delivered/06304988888").as_deref() == Some("true")).await;
    assert_eq!(gateway.tracker().outstanding(), 0);

    gateway.disconnect().await;
    assert_eq!(gateway.state(), SessionState::Closed);
}

#[tokio::test]
async fn long_text_goes_out_as_linked_segments() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let text = "a".repeat(200);
    let outcome = gateway.send(MSISDN, &text).await;
    assert!(outcome.is_success(), "{:?}", outcome);

    let submits = smsc.submits();
    assert_eq!(submits.len(), 2);
    let headers: Vec<ConcatHeader> = submits
        .iter()
        .map(|submit| {
            assert!(submit.esm_class.has_udhi());
            ConcatHeader::decode(&submit.short_message).unwrap()
        })
        .collect();
    assert_eq!(headers[0].reference, headers[1].reference);
    assert_eq!((headers[0].index, headers[0].total), (1, 2));
    assert_eq!((headers[1].index, headers[1].total), (2, 2));
}

#[tokio::test]
async fn connection_lost_mid_send_fails_the_waiter() {
    let smsc = MockSmsc::start(MockBehavior {
        drop_on_submit: true,
        ..Default::default()
    })
    .await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello", Duration::from_secs(2))
        .await;
    assert!(matches!(result, Err(SmppError::ConnectionLost(_))), "{:?}", result);
    assert_eq!(gateway.tracker().outstanding(), 0);
    assert_eq!(gateway.session().outstanding_submissions(), 0);
    eventually(|| gateway.state() == SessionState::Closed).await;
    assert!(store.get("smpp:is_sent/06304988888").is_none());
}

#[tokio::test]
async fn repeated_loss_reports_connection_failure_after_one_retry() {
    let smsc = MockSmsc::start(MockBehavior {
        drop_on_submit: true,
        ..Default::default()
    })
    .await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let outcome = gateway.send(MSISDN, "Hello").await;
    assert_eq!(outcome.code, SendOutcome::CONNECTION_FAILURE_CODE);
    assert_eq!(smsc.submits().len(), 2);
    assert_eq!(smsc.connections(), 2);
}

#[tokio::test]
async fn late_receipt_still_marks_delivered() {
    let smsc = MockSmsc::start(MockBehavior {
        send_receipts: false,
        ..Default::default()
    })
    .await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello", Duration::from_millis(200))
        .await;
    assert!(matches!(result, Err(SmppError::Timeout)));
    eventually(|| store.get("smpp:is_sent/06304988888").as_deref() == Some("true")).await;
    assert!(store.get("smpp:is_delivered/06304988888").is_none());

    smsc.push_receipt(MSISDN, "msg-1", MessageState::Delivered);
    eventually(|| store.get("smpp:is_delivered/06304988888").is_some()).await;
    assert_eq!(gateway.tracker().outstanding(), 0);
}

#[tokio::test]
async fn zero_timeout_sends_nothing() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello", Duration::ZERO)
        .await;
    assert!(matches!(result, Err(SmppError::Timeout)));
    assert!(smsc.submits().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn submit_before_bind_is_wrong_state() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.session().connect().await.unwrap();
    assert_eq!(gateway.state(), SessionState::Open);

    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello", Duration::from_secs(1))
        .await;
    assert!(matches!(result, Err(SmppError::WrongState { .. })), "{:?}", result);
    assert_eq!(gateway.tracker().outstanding(), 0);
    assert!(smsc.submits().is_empty());
}

#[tokio::test]
async fn rejected_submit_is_a_protocol_failure() {
    let smsc = MockSmsc::start(MockBehavior {
        submit_status: CommandStatus::THROTTLED,
        ..Default::default()
    })
    .await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let outcome = gateway.send(MSISDN, "Hello").await;
    assert_eq!(outcome.code, SendOutcome::PROTOCOL_FAILURE_CODE);
    assert!(!outcome.is_success());
    assert_eq!(smsc.submits().len(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn failed_receipt_fails_the_send() {
    let smsc = MockSmsc::start(MockBehavior {
        receipt_state: MessageState::Undeliverable,
        ..Default::default()
    })
    .await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    let outcome = gateway.send(MSISDN, "Hello").await;
    assert_eq!(outcome.code, SendOutcome::OTHER_FAILURE_CODE);
    assert!(outcome.message.contains("UNDELIV"), "{}", outcome.message);
    assert!(store.get("smpp:is_delivered/06304988888").is_none());
}

#[tokio::test]
async fn gateway_reconnects_after_smsc_drops_the_link() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    smsc.drop_connection();
    eventually(|| gateway.state() == SessionState::Closed).await;

    let outcome = gateway.send(MSISDN, "Hello again").await;
    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(smsc.connections(), 2);
    assert_eq!(gateway.state(), SessionState::BoundTrx);
}

#[tokio::test]
async fn gateway_rebinds_after_smsc_unbind() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = MemoryStore::new();
    let gateway = gateway(&smsc, &store);
    gateway.connect().await.unwrap();

    smsc.push_unbind();
    eventually(|| gateway.state() != SessionState::BoundTrx).await;

    let outcome = gateway.send(MSISDN, "Hello").await;
    assert!(outcome.is_success(), "{:?}", outcome);
    assert!(gateway.state().is_bound());
}

#[tokio::test]
async fn slow_store_does_not_delay_the_send() {
    let smsc = MockSmsc::start(MockBehavior::default()).await;
    let store = SlowStore {
        delay: Duration::from_secs(5),
        inner: MemoryStore::new(),
    };
    let gateway = GatewayBuilder::new(
        "127.0.0.1",
        smsc.port(),
        BindCredentials::transceiver("test", "secret"),
    )
    .keep_alive(KeepAliveConfig::disabled())
    .response_timeout(Duration::from_secs(2))
    .build(store.clone());
    gateway.connect().await.unwrap();

    let started = Instant::now();
    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello", Duration::from_secs(2))
        .await;
    assert!(result.is_ok(), "{:?}", result);
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());

    // The receive loop stays free while the writes are still pending
    let result = gateway
        .tracker()
        .send_and_wait(gateway.session(), MSISDN, "Hello again", Duration::from_secs(2))
        .await;
    assert!(result.is_ok(), "{:?}", result);
    assert!(store.inner.is_empty());
}
