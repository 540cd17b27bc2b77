// ABOUTME: Correlates submitted messages with their acknowledgements and delivery receipts
// ABOUTME: Turns the asynchronous submit/receipt exchange into one awaited result per send

use crate::client::error::{SmppError, SmppResult};
use crate::client::session::{PendingSubmission, Session, SessionEvents};
use crate::datatypes::DeliveryReceipt;
use crate::message::{OutboundMessage, Segmenter};
use crate::store::{DeliveryKeys, DeliveryStore};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Message ids of finished sends kept so their late receipts are not
/// mistaken for a newer send to the same destination
const RETIRED_MESSAGE_IDS: usize = 1024;

/// Upper bound on one delivery flag write
const STORE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// One outstanding send-and-wait call
struct Waiter {
    destination: String,
    expected: usize,
    acked: usize,
    delivered: bool,
    message_ids: Vec<String>,
    tx: oneshot::Sender<SmppResult<()>>,
}

#[derive(Default)]
struct Correlation {
    waiters: HashMap<u64, Waiter>,
    /// SMSC message id to waiter id, including retired waiters
    message_ids: HashMap<String, u64>,
    retired: VecDeque<String>,
}

impl Correlation {
    /// Remove a waiter and remember its message ids
    fn retire(&mut self, waiter_id: u64) -> Option<Waiter> {
        let mut waiter = self.waiters.remove(&waiter_id)?;
        for message_id in waiter.message_ids.drain(..) {
            self.retired.push_back(message_id);
        }
        while self.retired.len() > RETIRED_MESSAGE_IDS {
            if let Some(old) = self.retired.pop_front() {
                self.message_ids.remove(&old);
            }
        }
        Some(waiter)
    }

    fn complete(&mut self, waiter_id: u64, result: SmppResult<()>) {
        if let Some(waiter) = self.retire(waiter_id) {
            // The caller may already be gone
            let _ = waiter.tx.send(result);
        }
    }

    /// Which waiter a receipt belongs to. `Err(())` means the receipt names a
    /// finished send and must not fall back to destination matching.
    fn match_receipt(&self, receipt: &DeliveryReceipt) -> Result<Option<u64>, ()> {
        if let Some(waiter_id) = receipt
            .message_id
            .as_ref()
            .and_then(|id| self.message_ids.get(id))
        {
            return if self.waiters.contains_key(waiter_id) {
                Ok(Some(*waiter_id))
            } else {
                Err(())
            };
        }

        let recipient = normalize(&receipt.recipient);
        Ok(self
            .waiters
            .iter()
            .filter(|(_, waiter)| normalize(&waiter.destination) == recipient)
            .map(|(id, _)| *id)
            .min())
    }
}

fn normalize(msisdn: &str) -> &str {
    msisdn.trim_start_matches('+')
}

/// Correlates sends with their submit_sm_resp and deliver_sm receipts.
///
/// Installed as the session's [`SessionEvents`]; callers use
/// [`send_and_wait`](Self::send_and_wait). Receipts are matched by SMSC
/// message id first and by destination second, oldest waiter first.
pub struct DeliveryTracker<S> {
    correlation: Mutex<Correlation>,
    next_waiter: AtomicU64,
    segmenter: Segmenter,
    store: Arc<S>,
    keys: DeliveryKeys,
}

impl<S: DeliveryStore> DeliveryTracker<S> {
    pub fn new(store: S, keys: DeliveryKeys, segmenter: Segmenter) -> Self {
        Self {
            correlation: Mutex::new(Correlation::default()),
            next_waiter: AtomicU64::new(1),
            segmenter,
            store: Arc::new(store),
            keys,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Calls currently blocked in `send_and_wait`
    pub fn outstanding(&self) -> usize {
        self.correlation().waiters.len()
    }

    fn correlation(&self) -> MutexGuard<'_, Correlation> {
        self.correlation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Submit `text` to `destination` and wait until every segment is
    /// acknowledged and a delivery receipt arrives, or until `timeout`.
    ///
    /// Dropping the returned future abandons the wait; already written
    /// segments are not retracted.
    pub async fn send_and_wait(
        &self,
        session: &Session<Self>,
        destination: &str,
        text: &str,
        timeout: Duration,
    ) -> SmppResult<()> {
        if timeout.is_zero() {
            return Err(SmppError::Timeout);
        }

        let segments = self.segmenter.segment(text)?;
        let options = session.submit_options();
        let message =
            OutboundMessage::new(options.source(), options.destination(destination), segments);

        let waiter_id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.correlation().waiters.insert(
            waiter_id,
            Waiter {
                destination: destination.to_string(),
                expected: message.segments.len(),
                acked: 0,
                delivered: false,
                message_ids: Vec::new(),
                tx,
            },
        );
        let _guard = WaiterGuard {
            tracker: self,
            waiter_id,
        };

        session.submit(&message, waiter_id).await?;
        debug!(
            destination,
            waiter_id,
            segments = message.segments.len(),
            "Waiting for delivery"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SmppError::ConnectionLost("delivery waiter dropped".into())),
            Err(_) => {
                warn!(destination, waiter_id, "No delivery receipt before timeout");
                Err(SmppError::Timeout)
            }
        }
    }

    /// Write a delivery flag in the background. Callbacks run on the
    /// connection's receive loop, which must not wait on the store.
    fn persist(&self, key: String) {
        let store = self.store.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(STORE_WRITE_TIMEOUT, store.set(&key, "true")).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(key = %key, error = %e, "Failed to persist delivery flag"),
                Err(_) => warn!(key = %key, "Delivery flag write timed out"),
            }
        });
    }
}

/// Removes the waiter when the call returns or is cancelled
struct WaiterGuard<'a, S: DeliveryStore> {
    tracker: &'a DeliveryTracker<S>,
    waiter_id: u64,
}

impl<S: DeliveryStore> Drop for WaiterGuard<'_, S> {
    fn drop(&mut self) {
        self.tracker.correlation().retire(self.waiter_id);
    }
}

impl<S: DeliveryStore> SessionEvents for DeliveryTracker<S> {
    async fn on_submit_resp(&self, submission: PendingSubmission, message_id: String) {
        self.persist(self.keys.sent(&submission.destination));

        let mut correlation = self.correlation();
        let finished = match correlation.waiters.get_mut(&submission.waiter_id) {
            Some(waiter) => {
                waiter.acked += 1;
                if !message_id.is_empty() {
                    waiter.message_ids.push(message_id.clone());
                }
                waiter.acked >= waiter.expected && waiter.delivered
            }
            None => {
                // The caller gave up; remember the id as already finished
                if !message_id.is_empty() {
                    correlation.retired.push_back(message_id.clone());
                }
                false
            }
        };
        if !message_id.is_empty() {
            correlation
                .message_ids
                .insert(message_id, submission.waiter_id);
        }
        if finished {
            correlation.complete(submission.waiter_id, Ok(()));
        }
    }

    async fn on_submit_failed(&self, submission: PendingSubmission, error: SmppError) {
        warn!(
            destination = %submission.destination,
            segment = submission.segment_index,
            error = %error,
            "Send failed"
        );
        self.correlation().complete(submission.waiter_id, Err(error));
    }

    async fn on_delivery_receipt(&self, receipt: DeliveryReceipt) {
        if receipt.is_failed() {
            let state = receipt.state.unwrap_or(crate::datatypes::MessageState::Unknown);
            let mut correlation = self.correlation();
            if let Ok(Some(waiter_id)) = correlation.match_receipt(&receipt) {
                correlation.complete(waiter_id, Err(SmppError::DeliveryFailed(state)));
            }
            return;
        }
        if !receipt.is_delivered() {
            debug!(recipient = %receipt.recipient, state = ?receipt.state, "Intermediate receipt");
            return;
        }

        // Matched receipts are flagged under the destination the send used
        let destination = {
            let mut correlation = self.correlation();
            match correlation.match_receipt(&receipt) {
                Ok(Some(waiter_id)) => {
                    let (destination, finished) = match correlation.waiters.get_mut(&waiter_id) {
                        Some(waiter) => {
                            waiter.delivered = true;
                            (waiter.destination.clone(), waiter.acked >= waiter.expected)
                        }
                        None => (normalize(&receipt.recipient).to_string(), false),
                    };
                    if finished {
                        info!(recipient = %receipt.recipient, waiter_id, "Message delivered");
                        correlation.complete(waiter_id, Ok(()));
                    }
                    destination
                }
                _ => {
                    debug!(recipient = %receipt.recipient, "Receipt matches no waiting send");
                    normalize(&receipt.recipient).to_string()
                }
            }
        };
        self.persist(self.keys.delivered(&destination));
    }

    async fn on_session_lost(&self, reason: String) {
        let mut correlation = self.correlation();
        let ids: Vec<u64> = correlation.waiters.keys().copied().collect();
        if !ids.is_empty() {
            warn!(count = ids.len(), reason = %reason, "Failing waiting sends");
        }
        for waiter_id in ids {
            correlation.complete(waiter_id, Err(SmppError::ConnectionLost(reason.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::MessageState;
    use crate::store::MemoryStore;
    use tokio::time::Instant;

    fn tracker() -> DeliveryTracker<MemoryStore> {
        DeliveryTracker::new(MemoryStore::new(), DeliveryKeys::default(), Segmenter::default())
    }

    /// Flag writes run on spawned tasks; give them a moment to land
    async fn flag(tracker: &DeliveryTracker<MemoryStore>, key: &str) -> Option<String> {
        for _ in 0..100 {
            if let Some(value) = tracker.store().get(key) {
                return Some(value);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    fn add_waiter(
        tracker: &DeliveryTracker<MemoryStore>,
        destination: &str,
        expected: usize,
    ) -> (u64, oneshot::Receiver<SmppResult<()>>) {
        let waiter_id = tracker.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        tracker.correlation().waiters.insert(
            waiter_id,
            Waiter {
                destination: destination.to_string(),
                expected,
                acked: 0,
                delivered: false,
                message_ids: Vec::new(),
                tx,
            },
        );
        (waiter_id, rx)
    }

    fn submission(waiter_id: u64, destination: &str, segment_index: usize) -> PendingSubmission {
        PendingSubmission {
            sequence_number: segment_index as u32 + 1,
            destination: destination.to_string(),
            segment_index,
            submitted_at: Instant::now(),
            waiter_id,
        }
    }

    fn receipt(recipient: &str, message_id: Option<&str>, state: MessageState) -> DeliveryReceipt {
        DeliveryReceipt {
            message_id: message_id.map(str::to_string),
            state: Some(state),
            error_code: Some("000".into()),
            recipient: recipient.to_string(),
        }
    }

    #[tokio::test]
    async fn completes_after_all_acks_and_receipt() {
        let tracker = tracker();
        let (id, mut rx) = add_waiter(&tracker, "06304988888", 2);

        tracker
            .on_submit_resp(submission(id, "06304988888", 0), "m1".into())
            .await;
        tracker
            .on_delivery_receipt(receipt("06304988888", Some("m1"), MessageState::Delivered))
            .await;
        assert!(rx.try_recv().is_err(), "second segment not acked yet");

        tracker
            .on_submit_resp(submission(id, "06304988888", 1), "m2".into())
            .await;
        assert!(matches!(rx.await, Ok(Ok(()))));
        assert_eq!(tracker.outstanding(), 0);

        assert_eq!(flag(&tracker, "smpp:is_sent/06304988888").await.as_deref(), Some("true"));
        assert_eq!(
            flag(&tracker, "smpp:is_delivered/06304988888").await.as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn message_id_beats_destination_order() {
        let tracker = tracker();
        let (first, mut first_rx) = add_waiter(&tracker, "111", 1);
        let (second, second_rx) = add_waiter(&tracker, "111", 1);

        tracker.on_submit_resp(submission(first, "111", 0), "a".into()).await;
        tracker.on_submit_resp(submission(second, "111", 0), "b".into()).await;
        tracker
            .on_delivery_receipt(receipt("111", Some("b"), MessageState::Delivered))
            .await;

        assert!(matches!(second_rx.await, Ok(Ok(()))));
        assert!(first_rx.try_recv().is_err());
        assert_eq!(tracker.outstanding(), 1);
    }

    #[tokio::test]
    async fn receipt_without_id_matches_oldest_waiter() {
        let tracker = tracker();
        let (first, first_rx) = add_waiter(&tracker, "222", 1);
        let (second, _second_rx) = add_waiter(&tracker, "222", 1);

        tracker.on_submit_resp(submission(first, "222", 0), String::new()).await;
        tracker.on_submit_resp(submission(second, "222", 0), String::new()).await;
        tracker
            .on_delivery_receipt(receipt("+222", None, MessageState::Delivered))
            .await;

        assert!(matches!(first_rx.await, Ok(Ok(()))));
        assert_eq!(tracker.outstanding(), 1);
    }

    #[tokio::test]
    async fn late_receipt_for_finished_send_is_not_reassigned() {
        let tracker = tracker();
        let (old, old_rx) = add_waiter(&tracker, "333", 1);
        tracker.on_submit_resp(submission(old, "333", 0), "old".into()).await;
        drop(old_rx);
        tracker.correlation().retire(old);

        let (_new, mut new_rx) = add_waiter(&tracker, "333", 1);
        tracker
            .on_delivery_receipt(receipt("333", Some("old"), MessageState::Delivered))
            .await;

        assert!(new_rx.try_recv().is_err());
        assert_eq!(flag(&tracker, "smpp:is_delivered/333").await.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn unmatched_receipt_persists_delivered() {
        let tracker = tracker();
        tracker
            .on_delivery_receipt(receipt("444", None, MessageState::Delivered))
            .await;
        assert_eq!(flag(&tracker, "smpp:is_delivered/444").await.as_deref(), Some("true"));
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn plus_prefixed_receipt_flags_the_sent_destination() {
        let tracker = tracker();
        let (id, rx) = add_waiter(&tracker, "06304988888", 1);
        tracker
            .on_submit_resp(submission(id, "06304988888", 0), "m1".into())
            .await;
        tracker
            .on_delivery_receipt(receipt("+06304988888", None, MessageState::Delivered))
            .await;

        assert!(matches!(rx.await, Ok(Ok(()))));
        assert_eq!(flag(&tracker, "smpp:is_sent/06304988888").await.as_deref(), Some("true"));
        assert_eq!(
            flag(&tracker, "smpp:is_delivered/06304988888").await.as_deref(),
            Some("true")
        );
        assert!(tracker.store().get("smpp:is_delivered/+06304988888").is_none());
    }

    #[tokio::test]
    async fn unmatched_plus_receipt_is_flagged_without_the_plus() {
        let tracker = tracker();
        tracker
            .on_delivery_receipt(receipt("+777", None, MessageState::Delivered))
            .await;
        assert_eq!(flag(&tracker, "smpp:is_delivered/777").await.as_deref(), Some("true"));
        assert!(tracker.store().get("smpp:is_delivered/+777").is_none());
    }

    #[tokio::test]
    async fn failed_receipt_fails_the_waiter() {
        let tracker = tracker();
        let (id, rx) = add_waiter(&tracker, "555", 1);
        tracker.on_submit_resp(submission(id, "555", 0), "x".into()).await;
        tracker
            .on_delivery_receipt(receipt("555", Some("x"), MessageState::Undeliverable))
            .await;

        assert!(matches!(
            rx.await,
            Ok(Err(SmppError::DeliveryFailed(MessageState::Undeliverable)))
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(tracker.store().get("smpp:is_delivered/555").is_none());
    }

    #[tokio::test]
    async fn session_loss_fails_everyone() {
        let tracker = tracker();
        let (_, rx1) = add_waiter(&tracker, "1", 1);
        let (_, rx2) = add_waiter(&tracker, "2", 1);

        tracker.on_session_lost("eof".into()).await;

        assert!(matches!(rx1.await, Ok(Err(SmppError::ConnectionLost(_)))));
        assert!(matches!(rx2.await, Ok(Err(SmppError::ConnectionLost(_)))));
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_not_fatal() {
        let tracker = tracker();
        tracker.store().set_unavailable(true);
        let (id, rx) = add_waiter(&tracker, "666", 1);

        tracker.on_submit_resp(submission(id, "666", 0), "z".into()).await;
        tracker
            .on_delivery_receipt(receipt("666", Some("z"), MessageState::Delivered))
            .await;
        assert!(matches!(rx.await, Ok(Ok(()))));
    }
}
