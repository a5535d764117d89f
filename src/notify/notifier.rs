//! Notification send primitive
//!
//! Pushes one value to the connected client. Failures are reported to the
//! caller and never retried here.

use crate::gatt::table::ValueHandle;
use crate::link::events::ConnectionId;
use core::future::Future;

/// Errors that can occur while sending a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport could not allocate a buffer for the notification
    ResourceExhausted,
    /// The handle does not belong to a notifiable characteristic
    InvalidHandle,
    /// The payload does not match the characteristic's value format
    InvalidPayload,
}

/// Abstract notification transport
pub trait Notifier {
    /// Send `payload` as a notification of `handle` to `conn`.
    fn send(
        &mut self,
        conn: ConnectionId,
        handle: ValueHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), NotifyError>>;
}

#[cfg(test)]
pub mod mock {
    //! Mock notifier for testing

    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    /// A notification as seen by the mock transport
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentNotification {
        pub conn: ConnectionId,
        pub handle: ValueHandle,
        pub payload: Vec<u8, 8>,
    }

    /// Mock notifier for unit testing
    pub struct MockNotifier {
        /// Record of successful sends
        sent: RefCell<Vec<SentNotification, 64>>,
        /// Error to return on next send
        next_error: RefCell<Option<NotifyError>>,
        /// Number of send() calls, failed ones included
        attempts: RefCell<usize>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
                next_error: RefCell::new(None),
                attempts: RefCell::new(0),
            }
        }

        /// Set an error to be returned by the next send() call
        pub fn set_next_error(&self, error: NotifyError) {
            *self.next_error.borrow_mut() = Some(error);
        }

        /// Get all delivered notifications
        pub fn get_sent(&self) -> Vec<SentNotification, 64> {
            self.sent.borrow().clone()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.borrow().len()
        }

        pub fn attempt_count(&self) -> usize {
            *self.attempts.borrow()
        }

    }

    impl Default for MockNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Notifier for MockNotifier {
        async fn send(
            &mut self,
            conn: ConnectionId,
            handle: ValueHandle,
            payload: &[u8],
        ) -> Result<(), NotifyError> {
            *self.attempts.borrow_mut() += 1;

            if let Some(error) = self.next_error.borrow_mut().take() {
                return Err(error);
            }

            let payload = Vec::from_slice(payload).map_err(|_| NotifyError::InvalidPayload)?;
            let _ = self.sent.borrow_mut().push(SentNotification {
                conn,
                handle,
                payload,
            });
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use futures::executor::block_on;

        #[test]
        fn test_mock_records_sends() {
            let mut notifier = MockNotifier::new();
            block_on(async {
                notifier
                    .send(ConnectionId(1), ValueHandle(18), &[0x34, 0x12])
                    .await
                    .unwrap();
            });

            let sent = notifier.get_sent();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].payload.as_slice(), &[0x34, 0x12]);
        }

        #[test]
        fn test_mock_error_not_recorded() {
            let mut notifier = MockNotifier::new();
            notifier.set_next_error(NotifyError::ResourceExhausted);

            let result = block_on(notifier.send(ConnectionId(1), ValueHandle(18), &[0]));
            assert_eq!(result, Err(NotifyError::ResourceExhausted));
            assert_eq!(notifier.sent_count(), 0);
            assert_eq!(notifier.attempt_count(), 1);
        }

        #[test]
        fn test_mock_rejects_oversized_payload() {
            let mut notifier = MockNotifier::new();

            let result = block_on(notifier.send(ConnectionId(1), ValueHandle(18), &[0; 9]));
            assert_eq!(result, Err(NotifyError::InvalidPayload));
            assert_eq!(notifier.sent_count(), 0);
        }
    }
}
