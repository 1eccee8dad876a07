//! Thread-blocking mailbox.

use std::sync::{Condvar, Mutex, MutexGuard};

use super::MailboxError;
use super::slots::{Pop, Push, Slots};
use crate::domain::{Fragment, ReplyPolicy};

/// Bounded, ordered buffer shared between the listener thread and the caller.
///
/// `post` blocks while the buffer is full and `receive` blocks while it is
/// empty. Both wait on condition variables, so a post racing a waiting
/// receive is never missed.
#[derive(Debug)]
pub struct Mailbox {
    slots: Mutex<Slots>,
    not_empty: Condvar,
    not_full: Condvar,
    policy: ReplyPolicy,
}

impl Mailbox {
    pub fn new(capacity: usize, policy: ReplyPolicy) -> Self {
        Self {
            slots: Mutex::new(Slots::new(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            policy,
        }
    }

    /// Mailbox with the default reply policy.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, ReplyPolicy::default())
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert one fragment, blocking while the mailbox is at capacity.
    pub fn post(&self, fragment: impl Into<Fragment>) -> Result<(), MailboxError> {
        let mut fragment = fragment.into();
        let mut slots = self.lock();
        loop {
            match slots.push(fragment) {
                Push::Stored => {
                    drop(slots);
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Push::Closed => return Err(MailboxError::Closed),
                Push::Full(returned) => {
                    fragment = returned;
                    slots = self.not_full.wait(slots).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// Remove the oldest fragment, blocking until one is available.
    ///
    /// Fails only once the mailbox is closed and drained.
    pub fn receive(&self) -> Result<Fragment, MailboxError> {
        let mut slots = self.lock();
        loop {
            match slots.pop() {
                Pop::Item(fragment) => {
                    drop(slots);
                    self.not_full.notify_one();
                    return Ok(fragment);
                }
                Pop::Closed => return Err(MailboxError::Closed),
                Pop::Empty => {
                    slots = self.not_empty.wait(slots).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// Remove the oldest fragment if one is pending.
    pub fn try_receive(&self) -> Option<Fragment> {
        let popped = self.lock().pop();
        match popped {
            Pop::Item(fragment) => {
                self.not_full.notify_one();
                Some(fragment)
            }
            Pop::Empty | Pop::Closed => None,
        }
    }

    /// Drain fragments until the sentinel arrives.
    ///
    /// The sentinel is swallowed. Every call starts a fresh drain.
    pub fn receive_all(&self) -> ReplyStream<'_> {
        ReplyStream {
            mailbox: self,
            finished: false,
        }
    }

    /// Reject further posts and wake every blocked producer and consumer.
    pub fn close(&self) {
        self.lock().close();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Accept posts again after `close`.
    pub fn reopen(&self) {
        self.lock().reopen();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn policy(&self) -> &ReplyPolicy {
        &self.policy
    }
}

/// Single-pass iterator over one sentinel-terminated reply.
///
/// Yields `Err` at most once, after which it is exhausted.
#[derive(Debug)]
pub struct ReplyStream<'a> {
    mailbox: &'a Mailbox,
    finished: bool,
}

impl Iterator for ReplyStream<'_> {
    type Item = Result<Fragment, MailboxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.mailbox.receive() {
            Ok(fragment) => {
                let admitted = self.mailbox.policy.admit(fragment);
                if admitted.is_none() {
                    self.finished = true;
                }
                admitted.map(Ok)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for ReplyStream<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_receive_all_stops_at_sentinel() {
        let mailbox = Mailbox::with_capacity(8);
        mailbox.post("Hello").unwrap();
        mailbox.post("World").unwrap();
        mailbox.post("<exit>").unwrap();

        let reply: Vec<_> = mailbox.receive_all().collect::<Result<_, _>>().unwrap();
        assert_eq!(reply, vec!["Hello", "World"]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_receive_all_on_bare_sentinel_is_empty() {
        let mailbox = Mailbox::with_capacity(8);
        mailbox.post(" <exit> ").unwrap();
        assert_eq!(mailbox.receive_all().count(), 0);
    }

    #[test]
    fn test_each_drain_is_fresh() {
        let mailbox = Mailbox::with_capacity(8);
        for f in ["a", "<exit>", "b", "</>", "c", "<exit>"] {
            mailbox.post(f).unwrap();
        }

        let first: Vec<_> = mailbox.receive_all().map(Result::unwrap).collect();
        let second: Vec<_> = mailbox.receive_all().map(Result::unwrap).collect();
        assert_eq!(first, vec!["a"]);
        assert_eq!(second, vec!["b", "</>", "c"]);
    }

    #[test]
    fn test_try_receive_on_empty_returns_none() {
        let mailbox = Mailbox::with_capacity(2);
        assert_eq!(mailbox.try_receive(), None);
        mailbox.post("x").unwrap();
        assert_eq!(mailbox.try_receive(), Some("x".to_string()));
        assert_eq!(mailbox.try_receive(), None);
    }

    #[test]
    fn test_post_blocks_at_capacity_until_receive() {
        let mailbox = Arc::new(Mailbox::with_capacity(2));
        mailbox.post("1").unwrap();
        mailbox.post("2").unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                mailbox.post("3").unwrap();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(mailbox.receive().unwrap(), "1");
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        producer.join().unwrap();

        assert_eq!(mailbox.receive().unwrap(), "2");
        assert_eq!(mailbox.receive().unwrap(), "3");
    }

    #[test]
    fn test_receive_wakes_on_concurrent_post() {
        let mailbox = Arc::new(Mailbox::with_capacity(1));
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.receive_all().map(Result::unwrap).collect::<Vec<_>>())
        };

        for f in ["one", "two", "three", "<exit>"] {
            mailbox.post(f).unwrap();
        }
        assert_eq!(consumer.join().unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_close_wakes_blocked_consumer_with_error() {
        let mailbox = Arc::new(Mailbox::with_capacity(4));
        mailbox.post("partial").unwrap();

        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.receive_all().collect::<Vec<_>>())
        };
        thread::sleep(Duration::from_millis(50));
        mailbox.close();

        let items = consumer.join().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref(), Ok("partial"));
        assert_eq!(items[1], Err(MailboxError::Closed));
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let mailbox = Arc::new(Mailbox::with_capacity(1));
        mailbox.post("full").unwrap();

        let producer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.post("blocked"))
        };
        thread::sleep(Duration::from_millis(50));
        mailbox.close();

        assert_eq!(producer.join().unwrap(), Err(MailboxError::Closed));
        mailbox.reopen();
        assert!(!mailbox.is_closed());
        assert_eq!(mailbox.try_receive(), Some("full".to_string()));
    }
}
