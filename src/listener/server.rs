//! UDP receive loop with start/stop lifecycle.
//!
//! Two threads per running listener: the reader owns the socket and only
//! receives, the dispatcher calls the observers. A stalled observer can
//! therefore delay dispatch but never keeps the socket bound after `stop`.

use chrono::Local;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::datagram::{Datagram, DatagramObserver, decode_payload};
use super::{ListenerError, ListenerState, RunMode};
use crate::config::ListenerSettings;

/// Receive timeout; only makes the stop check periodic.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// How long `stop` waits for the dispatch thread.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause after an unexpected receive error.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Datagrams buffered between reader and dispatcher.
const DISPATCH_QUEUE: usize = 64;

/// Retry interval while the dispatch queue is full.
const QUEUE_RETRY: Duration = Duration::from_millis(10);

/// Observers shared with the dispatch loop.
struct Shared {
    observers: RwLock<Vec<Arc<dyn DatagramObserver>>>,
}

impl Shared {
    fn snapshot(&self) -> Vec<Arc<dyn DatagramObserver>> {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deliver to every observer in order; failures stay contained.
    fn dispatch(&self, datagram: &Datagram) {
        for (index, observer) in self.snapshot().iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_datagram(datagram))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("[talkback:listener] Observer #{} failed: {:#}", index, e);
                }
                Err(_) => {
                    warn!("[talkback:listener] Observer #{} panicked", index);
                }
            }
        }
    }
}

struct Dispatcher {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Live binding: at most one per listener.
struct Binding {
    local_addr: Option<SocketAddr>,
    /// Run flag of this binding only; a restart gets a fresh one.
    run: Arc<AtomicBool>,
    /// Owns the socket; joined on stop.
    reader: Option<JoinHandle<()>>,
    /// Background mode only; detached if it outlives `STOP_TIMEOUT`.
    dispatcher: Option<Dispatcher>,
}

/// Receives UDP datagrams and fans them out to registered observers.
///
/// # Lifecycle
///
/// `Idle → Starting → Running → Stopping → Idle`. [`start`](Self::start)
/// binds the socket synchronously, so a bind failure is returned to the
/// caller and the listener stays `Idle`. [`stop`](Self::stop) and `Drop`
/// always close the socket before returning.
///
/// All methods take `&self`; the listener can be shared behind an `Arc` and
/// stopped from another thread or from inside an observer.
pub struct DatagramListener {
    settings: ListenerSettings,
    shared: Arc<Shared>,
    state: Mutex<ListenerState>,
    binding: Mutex<Option<Binding>>,
}

impl std::fmt::Debug for DatagramListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramListener")
            .field("endpoint", &self.settings.endpoint())
            .field("state", &self.state())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl DatagramListener {
    pub fn new(settings: ListenerSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared {
                observers: RwLock::new(Vec::new()),
            }),
            state: Mutex::new(ListenerState::Idle),
            binding: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_binding(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    pub fn state(&self) -> ListenerState {
        *self.lock_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Address actually bound (resolves port 0), while a binding is live.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_binding().as_ref().and_then(|b| b.local_addr)
    }

    /// Append an observer. Registrations last for the listener's lifetime.
    pub fn register(&self, observer: Arc<dyn DatagramObserver>) {
        self.shared
            .observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.shared
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Bind the socket and run the receive loop.
    ///
    /// With [`RunMode::Inline`] observers run on the calling thread and this
    /// blocks until [`stop`](Self::stop) is called from another thread or an
    /// observer. Calling `start` on a running listener only logs a warning.
    pub fn start(&self, mode: RunMode) -> Result<(), ListenerError> {
        {
            let mut state = self.lock_state();
            match *state {
                ListenerState::Idle => *state = ListenerState::Starting,
                ListenerState::Running => {
                    warn!(
                        "[talkback:listener] Already running on {}",
                        self.settings.endpoint()
                    );
                    return Ok(());
                }
                other => return Err(ListenerError::Busy(other)),
            }
        }

        let socket = match bind_socket(&self.settings) {
            Ok(socket) => socket,
            Err(source) => {
                *self.lock_state() = ListenerState::Idle;
                return Err(ListenerError::Bind {
                    endpoint: self.settings.endpoint(),
                    source,
                });
            }
        };
        let local_addr = socket.local_addr().ok();
        let run = Arc::new(AtomicBool::new(true));
        let (queue_tx, queue_rx) = mpsc::sync_channel::<Datagram>(DISPATCH_QUEUE);

        let reader = {
            let run = Arc::clone(&run);
            let buffer_size = self.settings.buffer_size;
            thread::Builder::new()
                .name("talkback-listener".to_string())
                .spawn(move || receive_loop(&run, &socket, buffer_size, &queue_tx))
        };
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                *self.lock_state() = ListenerState::Idle;
                return Err(ListenerError::Spawn(e));
            }
        };

        let mut binding = Binding {
            local_addr,
            run: Arc::clone(&run),
            reader: Some(reader),
            dispatcher: None,
        };

        let inline_queue = match mode {
            RunMode::Inline => Some(queue_rx),
            RunMode::Background => {
                let (done_tx, done_rx) = mpsc::channel();
                let shared = Arc::clone(&self.shared);
                let dispatch_run = Arc::clone(&run);
                let spawned = thread::Builder::new()
                    .name("talkback-dispatch".to_string())
                    .spawn(move || {
                        dispatch_loop(&shared, &dispatch_run, queue_rx);
                        let _ = done_tx.send(());
                    });
                match spawned {
                    Ok(handle) => {
                        binding.dispatcher = Some(Dispatcher {
                            handle,
                            done: done_rx,
                        });
                        None
                    }
                    Err(e) => {
                        shut_down(binding);
                        *self.lock_state() = ListenerState::Idle;
                        return Err(ListenerError::Spawn(e));
                    }
                }
            }
        };

        *self.lock_binding() = Some(binding);
        *self.lock_state() = ListenerState::Running;
        info!(
            "[talkback:listener] Listening on udp://{}",
            local_addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| self.settings.endpoint())
        );

        if let Some(queue) = inline_queue {
            dispatch_loop(&self.shared, &run, queue);
            // Only tear down our own binding; a restart may have replaced it.
            let current = self
                .lock_binding()
                .as_ref()
                .is_some_and(|b| Arc::ptr_eq(&b.run, &run));
            if current {
                self.stop();
            }
        }

        Ok(())
    }

    /// Start in background mode and stop again when the returned scope drops.
    pub fn scoped(&self) -> Result<ListenerScope<'_>, ListenerError> {
        self.start(RunMode::Background)?;
        Ok(ListenerScope { listener: self })
    }

    /// Stop receiving and close the socket. No-op when idle.
    ///
    /// The socket is closed before this returns. Dispatch of an already
    /// received datagram is waited for up to two seconds, then detached.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            match *state {
                ListenerState::Idle | ListenerState::Stopping => return,
                _ => *state = ListenerState::Stopping,
            }
        }

        let binding = self.lock_binding().take();
        if let Some(binding) = binding {
            shut_down(binding);
            info!("[talkback:listener] Closed {}", self.settings.endpoint());
        }
        *self.lock_state() = ListenerState::Idle;
    }
}

impl Drop for DatagramListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps a listener running for as long as it is alive.
#[must_use = "the listener stops as soon as the scope is dropped"]
pub struct ListenerScope<'a> {
    listener: &'a DatagramListener,
}

impl std::ops::Deref for ListenerScope<'_> {
    type Target = DatagramListener;

    fn deref(&self) -> &Self::Target {
        self.listener
    }
}

impl Drop for ListenerScope<'_> {
    fn drop(&mut self) {
        self.listener.stop();
    }
}

/// Stop both threads of a binding. Returns once the socket is closed.
fn shut_down(mut binding: Binding) {
    binding.run.store(false, Ordering::SeqCst);

    if let Some(reader) = binding.reader.take() {
        if reader.join().is_err() {
            warn!("[talkback:listener] Receive thread panicked");
        }
    }

    let Some(dispatcher) = binding.dispatcher.take() else {
        return;
    };
    // Stopped from inside an observer: the dispatcher finishes on its own.
    if dispatcher.handle.thread().id() == thread::current().id() {
        return;
    }
    match dispatcher.done.recv_timeout(STOP_TIMEOUT) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
            if dispatcher.handle.join().is_err() {
                warn!("[talkback:listener] Dispatch thread panicked");
            }
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "[talkback:listener] Observer still busy after {:?}; detaching dispatch thread",
                STOP_TIMEOUT
            );
        }
    }
}

fn resolve(settings: &ListenerSettings) -> io::Result<SocketAddr> {
    (settings.address.as_str(), settings.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

fn bind_socket(settings: &ListenerSettings) -> io::Result<UdpSocket> {
    let address = resolve(settings)?;
    let socket = Socket::new(Domain::for_address(address), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    socket.bind(&address.into())?;
    Ok(socket.into())
}

fn receive_loop(run: &AtomicBool, socket: &UdpSocket, buffer_size: usize, queue: &SyncSender<Datagram>) {
    let mut buffer = vec![0u8; buffer_size.max(1)];

    while run.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buffer) {
            Ok((len, origin)) => {
                let datagram = Datagram {
                    text: decode_payload(&buffer[..len]),
                    origin,
                    received_at: Local::now(),
                };
                debug!(
                    "[talkback:listener] {} bytes from {}: {:?}",
                    len, origin, datagram.text
                );
                if !hand_off(run, queue, datagram) {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => {
                if run.load(Ordering::SeqCst) {
                    error!("[talkback:listener] Receive error: {}", e);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
    }

    debug!("[talkback:listener] Receive loop finished");
}

/// Queue a datagram for dispatch, waiting while the queue is full.
///
/// Returns false once the listener is stopping or the dispatcher is gone.
fn hand_off(run: &AtomicBool, queue: &SyncSender<Datagram>, mut datagram: Datagram) -> bool {
    loop {
        match queue.try_send(datagram) {
            Ok(()) => return true,
            Err(TrySendError::Full(returned)) => {
                if !run.load(Ordering::SeqCst) {
                    return false;
                }
                datagram = returned;
                thread::sleep(QUEUE_RETRY);
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// Call observers for each queued datagram until the reader goes away.
fn dispatch_loop(shared: &Shared, run: &AtomicBool, queue: Receiver<Datagram>) {
    for datagram in queue {
        if !run.load(Ordering::SeqCst) {
            break;
        }
        shared.dispatch(&datagram);
    }
    debug!("[talkback:listener] Dispatch loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Instant;

    fn loopback() -> ListenerSettings {
        ListenerSettings::new("127.0.0.1", 0)
    }

    fn port_is_free(addr: SocketAddr) -> bool {
        // Plain bind, no SO_REUSEADDR: fails while any socket holds the port
        UdpSocket::bind(addr).is_ok()
    }

    #[test]
    fn test_start_stop_transitions() {
        let listener = DatagramListener::new(loopback());
        assert_eq!(listener.state(), ListenerState::Idle);
        assert_eq!(listener.local_addr(), None);

        listener.start(RunMode::Background).unwrap();
        assert!(listener.is_running());
        let addr = listener.local_addr().unwrap();
        assert!(!port_is_free(addr));

        listener.stop();
        assert_eq!(listener.state(), ListenerState::Idle);
        assert_eq!(listener.local_addr(), None);
        assert!(port_is_free(addr));

        // Idle stop is a no-op
        listener.stop();
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn test_second_start_is_noop() {
        let listener = DatagramListener::new(loopback());
        listener.start(RunMode::Background).unwrap();
        let addr = listener.local_addr();

        listener.start(RunMode::Background).unwrap();
        assert_eq!(listener.local_addr(), addr);
        listener.stop();
    }

    #[test]
    fn test_bind_failure_surfaces() {
        let occupied = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let listener = DatagramListener::new(ListenerSettings::new("127.0.0.1", port));
        let err = listener.start(RunMode::Background).unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn test_unresolvable_address_is_bind_error() {
        let listener = DatagramListener::new(ListenerSettings::new("not an address", 0));
        assert!(matches!(
            listener.start(RunMode::Background),
            Err(ListenerError::Bind { .. })
        ));
    }

    #[test]
    fn test_inline_mode_stops_from_observer() {
        let listener = Arc::new(DatagramListener::new(loopback()));
        let (tx, rx) = channel::<String>();

        let weak = Arc::downgrade(&listener);
        listener.register(Arc::new(move |d: &Datagram| -> anyhow::Result<()> {
            tx.send(d.text.clone())?;
            if let Some(listener) = weak.upgrade() {
                listener.stop();
            }
            Ok(())
        }));

        let runner = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.start(RunMode::Inline))
        };

        let addr = loop {
            if let Some(addr) = listener.local_addr() {
                break addr;
            }
            thread::sleep(Duration::from_millis(10));
        };
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"bye", addr).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "bye");
        runner.join().unwrap().unwrap();
        assert_eq!(listener.state(), ListenerState::Idle);
        assert!(port_is_free(addr));
    }

    #[test]
    fn test_stop_from_observer_in_background() {
        let listener = Arc::new(DatagramListener::new(loopback()));
        let (tx, rx) = channel::<()>();

        let weak = Arc::downgrade(&listener);
        listener.register(Arc::new(move |_: &Datagram| -> anyhow::Result<()> {
            if let Some(listener) = weak.upgrade() {
                listener.stop();
            }
            tx.send(())?;
            Ok(())
        }));

        listener.start(RunMode::Background).unwrap();
        let addr = listener.local_addr().unwrap();
        UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .send_to(b"stop", addr)
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(listener.state(), ListenerState::Idle);
        assert!(port_is_free(addr));
    }

    #[test]
    fn test_hand_off_gives_up_when_stopping() {
        let (tx, _rx) = mpsc::sync_channel::<Datagram>(1);
        let run = AtomicBool::new(true);
        let datagram = || Datagram {
            text: "x".to_string(),
            origin: "127.0.0.1:1".parse().unwrap(),
            received_at: Local::now(),
        };

        assert!(hand_off(&run, &tx, datagram()));
        run.store(false, Ordering::SeqCst);
        let started = Instant::now();
        assert!(!hand_off(&run, &tx, datagram()));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
