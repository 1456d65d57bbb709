use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tokio::time::Instant;

use crate::client::message::Request;
use crate::common::frame::TxId;
use crate::error::{InternalError, RequestError};

/// Pending transactions of a single connection, keyed by transaction id.
///
/// A transaction is created when the request is written to the stream and
/// destroyed when the matching response arrives, when its deadline expires,
/// or when the connection is lost. First completion wins: a response that
/// arrives after the deadline has already expired the transaction finds no
/// pending entry and is dropped by the caller.
pub(crate) struct TransactionTracker {
    pending: BTreeMap<u16, PendingTransaction>,
}

struct PendingTransaction {
    deadline: Instant,
    request: Request,
}

impl TransactionTracker {
    pub(crate) fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    pub(crate) fn is_pending(&self, tx_id: TxId) -> bool {
        self.pending.contains_key(&tx_id.to_u16())
    }

    /// Track a request until it is resolved, expired, or failed. If the id is
    /// already pending on this connection, the new request is completed with
    /// a `DuplicateTransaction` error and the existing transaction is
    /// unaffected.
    pub(crate) fn register(&mut self, tx_id: TxId, deadline: Instant, request: Request) {
        match self.pending.entry(tx_id.to_u16()) {
            Entry::Occupied(_) => {
                tracing::warn!("transaction id already pending: {}", tx_id);
                request.fail(InternalError::DuplicateTransaction(tx_id.to_u16()).into());
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingTransaction { deadline, request });
            }
        }
    }

    /// Remove and return the pending transaction with the provided id, if any
    pub(crate) fn resolve(&mut self, tx_id: TxId) -> Option<Request> {
        self.pending.remove(&tx_id.to_u16()).map(|x| x.request)
    }

    /// The earliest deadline among the pending transactions
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|x| x.deadline).min()
    }

    /// Complete every transaction whose deadline has passed with a timeout,
    /// making its id available for reuse
    pub(crate) fn expire(&mut self, now: Instant) {
        let expired: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, x)| x.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(x) = self.pending.remove(&id) {
                tracing::warn!("transaction {:#06X} timed out", id);
                x.request.fail(RequestError::ResponseTimeout);
            }
        }
    }

    /// Complete every pending transaction with the provided error, e.g. when
    /// the connection is lost or the channel is shut down
    pub(crate) fn fail_all(&mut self, err: RequestError) {
        for (_, x) in std::mem::take(&mut self.pending) {
            x.request.fail(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::client::message::{Promise, RequestDetails};
    use crate::client::requests::read_bits::ReadBits;
    use crate::error::AduParseError;
    use crate::types::{AddressRange, Indexed, UnitId};

    type ReadBitsReceiver = oneshot::Receiver<Result<Vec<Indexed<bool>>, RequestError>>;

    fn read_coils_request() -> (Request, ReadBitsReceiver) {
        let (tx, rx) = oneshot::channel();
        let range = AddressRange::try_from(0, 1).unwrap().of_read_bits().unwrap();
        let request = Request::new(
            UnitId::new(1),
            Duration::from_secs(1),
            RequestDetails::ReadCoils(ReadBits::new(range, Promise::Channel(tx))),
        );
        (request, rx)
    }

    #[test]
    fn expired_transaction_fails_with_timeout_and_frees_the_id() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (request, mut rx) = read_coils_request();

        tracker.register(TxId::new(7), now, request);
        assert!(tracker.is_pending(TxId::new(7)));

        tracker.expire(now);
        assert_eq!(rx.try_recv().unwrap(), Err(RequestError::ResponseTimeout));
        assert!(!tracker.is_pending(TxId::new(7)));

        // the id is now reusable
        let (request, mut rx) = read_coils_request();
        tracker.register(TxId::new(7), now + Duration::from_secs(1), request);
        assert!(tracker.is_pending(TxId::new(7)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn expire_leaves_transactions_before_their_deadline_untouched() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (early, mut early_rx) = read_coils_request();
        let (late, mut late_rx) = read_coils_request();

        tracker.register(TxId::new(0), now, early);
        tracker.register(TxId::new(1), now + Duration::from_secs(5), late);

        tracker.expire(now);
        assert_eq!(
            early_rx.try_recv().unwrap(),
            Err(RequestError::ResponseTimeout)
        );
        assert!(late_rx.try_recv().is_err());
        assert!(tracker.is_pending(TxId::new(1)));
        assert_eq!(
            tracker.next_deadline().unwrap(),
            now + Duration::from_secs(5)
        );
    }

    #[test]
    fn duplicate_registration_fails_the_new_request_only() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (first, mut first_rx) = read_coils_request();
        let (second, mut second_rx) = read_coils_request();

        tracker.register(TxId::new(3), now + Duration::from_secs(1), first);
        tracker.register(TxId::new(3), now + Duration::from_secs(1), second);

        assert_eq!(
            second_rx.try_recv().unwrap(),
            Err(RequestError::Internal(InternalError::DuplicateTransaction(
                3
            )))
        );
        assert!(first_rx.try_recv().is_err());
        assert!(tracker.is_pending(TxId::new(3)));
    }

    #[test]
    fn late_response_finds_no_pending_transaction() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (request, _rx) = read_coils_request();

        tracker.register(TxId::new(4), now, request);
        tracker.expire(now);

        assert!(tracker.resolve(TxId::new(4)).is_none());
    }

    #[test]
    fn fail_all_completes_every_pending_transaction() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (first, mut first_rx) = read_coils_request();
        let (second, mut second_rx) = read_coils_request();

        tracker.register(TxId::new(0), now + Duration::from_secs(1), first);
        tracker.register(TxId::new(1), now + Duration::from_secs(1), second);
        tracker.fail_all(RequestError::ConnectionClosed);

        assert_eq!(
            first_rx.try_recv().unwrap(),
            Err(RequestError::ConnectionClosed)
        );
        assert_eq!(
            second_rx.try_recv().unwrap(),
            Err(RequestError::ConnectionClosed)
        );
        assert!(tracker.next_deadline().is_none());
    }

    #[test]
    fn resolved_request_can_parse_its_response() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (request, mut rx) = read_coils_request();

        tracker.register(TxId::new(0), now + Duration::from_secs(1), request);
        let request = tracker.resolve(TxId::new(0)).unwrap();

        // function code 0x01, byte count 1, one coil == true
        request.handle_response(&[0x01, 0x01, 0x01]);
        assert_eq!(
            rx.try_recv().unwrap(),
            Ok(vec![Indexed::new(0, true)])
        );
    }

    #[test]
    fn exception_response_completes_the_request_with_the_code() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (request, mut rx) = read_coils_request();

        tracker.register(TxId::new(0), now + Duration::from_secs(1), request);
        let request = tracker.resolve(TxId::new(0)).unwrap();

        request.handle_response(&[0x81, 0x02]);
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(RequestError::Exception(
                crate::exception::ExceptionCode::IllegalDataAddress
            ))
        );
    }

    #[test]
    fn unknown_response_function_fails_the_request() {
        let mut tracker = TransactionTracker::new();
        let now = Instant::now();
        let (request, mut rx) = read_coils_request();

        tracker.register(TxId::new(0), now + Duration::from_secs(1), request);
        let request = tracker.resolve(TxId::new(0)).unwrap();

        request.handle_response(&[0x03, 0x02, 0x00, 0x00]);
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(RequestError::BadResponse(
                AduParseError::UnknownResponseFunction(0x03, 0x01, 0x81)
            ))
        );
    }
}
