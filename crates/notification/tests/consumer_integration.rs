//! Integration tests for the publish → consume → deliver pipeline, using
//! in-memory gateways and a scripted message stream in place of the broker.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use notification::{
    ConsumerStats, InMemoryEmailGateway, InMemoryPublisher, InMemorySmsGateway, InboundMessage,
    NotificationConsumer, NotificationDispatcher, NotificationError, NotificationIntent,
    NotificationPublisher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Acked,
    Rejected,
}

type OutcomeLog = Arc<Mutex<Vec<(usize, Outcome)>>>;

struct TestMessage {
    seq: usize,
    body: Vec<u8>,
    log: OutcomeLog,
}

#[async_trait]
impl InboundMessage for TestMessage {
    fn payload(&self) -> &[u8] {
        &self.body
    }

    async fn ack(self) -> notification::Result<()> {
        self.log.lock().unwrap().push((self.seq, Outcome::Acked));
        Ok(())
    }

    async fn reject(self) -> notification::Result<()> {
        self.log.lock().unwrap().push((self.seq, Outcome::Rejected));
        Ok(())
    }
}

struct TestHarness {
    consumer: NotificationConsumer,
    sms: InMemorySmsGateway,
    email: InMemoryEmailGateway,
    log: OutcomeLog,
}

impl TestHarness {
    fn new() -> Self {
        let sms = InMemorySmsGateway::new();
        let email = InMemoryEmailGateway::new();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(sms.clone()), Arc::new(email.clone()));
        Self {
            consumer: NotificationConsumer::new(dispatcher),
            sms,
            email,
            log: Arc::default(),
        }
    }

    fn messages(&self, bodies: Vec<Vec<u8>>) -> Vec<Result<TestMessage, NotificationError>> {
        bodies
            .into_iter()
            .enumerate()
            .map(|(seq, body)| {
                Ok(TestMessage {
                    seq,
                    body,
                    log: self.log.clone(),
                })
            })
            .collect()
    }

    async fn consume(&self, bodies: Vec<Vec<u8>>) -> notification::Result<ConsumerStats> {
        self.consumer.run(stream::iter(self.messages(bodies))).await
    }

    fn outcomes(&self) -> Vec<(usize, Outcome)> {
        self.log.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_published_intents_are_delivered_in_order() {
    let h = TestHarness::new();
    let publisher = InMemoryPublisher::new();

    publisher
        .publish(&NotificationIntent::sms("254700000001", "Your order #1 has been placed successfully!"))
        .await
        .unwrap();
    publisher
        .publish(&NotificationIntent::email("admin@example.com", "New Order Placed: #1", "body"))
        .await
        .unwrap();

    let stats = h.consume(publisher.take_messages().await).await.unwrap();

    assert_eq!(stats, ConsumerStats { delivered: 2, rejected: 0 });
    assert_eq!(h.outcomes(), vec![(0, Outcome::Acked), (1, Outcome::Acked)]);
    assert_eq!(h.sms.sent().await[0].to, "254700000001");
    assert_eq!(h.email.sent().await[0].subject, "New Order Placed: #1");
}

#[tokio::test]
async fn test_gateway_failure_rejects_once_and_continues() {
    let h = TestHarness::new();
    h.email.set_fail_on_send(true);

    let bodies = vec![
        NotificationIntent::email("admin@example.com", "s", "b").to_wire().unwrap(),
        NotificationIntent::sms("254700000001", "next").to_wire().unwrap(),
    ];
    let stats = h.consume(bodies).await.unwrap();

    assert_eq!(stats, ConsumerStats { delivered: 1, rejected: 1 });
    assert_eq!(h.outcomes(), vec![(0, Outcome::Rejected), (1, Outcome::Acked)]);
    assert_eq!(h.sms.sent().await.len(), 1);
    assert!(h.email.sent().await.is_empty());
}

#[tokio::test]
async fn test_unknown_type_and_malformed_body_rejected() {
    let h = TestHarness::new();

    let bodies = vec![
        br#"{"type":"fax","to":"x","message":"m"}"#.to_vec(),
        b"garbage".to_vec(),
        br#"{"type":"sms","to":"254700000001"}"#.to_vec(),
    ];
    let stats = h.consume(bodies).await.unwrap();

    assert_eq!(stats, ConsumerStats { delivered: 0, rejected: 3 });
    assert!(h.outcomes().iter().all(|(_, o)| *o == Outcome::Rejected));
    assert!(h.sms.sent().await.is_empty());
}

#[tokio::test]
async fn test_stream_error_stops_consumer() {
    let h = TestHarness::new();
    let items: Vec<Result<TestMessage, NotificationError>> = vec![
        Ok(TestMessage {
            seq: 0,
            body: NotificationIntent::sms("254700000001", "ok").to_wire().unwrap(),
            log: h.log.clone(),
        }),
        Err(NotificationError::ChannelClosed),
        Ok(TestMessage {
            seq: 2,
            body: NotificationIntent::sms("254700000002", "never").to_wire().unwrap(),
            log: h.log.clone(),
        }),
    ];

    let result = h.consumer.run(stream::iter(items)).await;

    assert!(matches!(result, Err(NotificationError::ChannelClosed)));
    assert_eq!(h.outcomes(), vec![(0, Outcome::Acked)]);
    assert_eq!(h.sms.sent().await.len(), 1);
}
