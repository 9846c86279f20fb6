//! Synchronous and asynchronous log dispatchers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::error::{LogError, Result};
use super::event::{put_event, Event};
use super::layout::Layout;
use super::level::{Level, LevelRange, MAX};
use crate::appenders::Appender;

/// A reference to an appender by name, resolved exactly once during
/// configuration refresh. The level window restricts which events reach
/// the resolved appender.
pub struct AppenderRef {
    pub ref_name: String,
    pub level: LevelRange,
    appender: OnceCell<Arc<dyn Appender>>,
}

impl AppenderRef {
    pub fn new(ref_name: impl Into<String>, level: LevelRange) -> Self {
        Self {
            ref_name: ref_name.into(),
            level,
            appender: OnceCell::new(),
        }
    }

    pub(crate) fn bind(&self, appender: Arc<dyn Appender>) {
        let _ = self.appender.set(appender);
    }

    fn appender(&self) -> Option<&Arc<dyn Appender>> {
        self.appender.get()
    }
}

/// The frozen dispatch table a logger publishes through: ordered appender
/// refs plus an optional logger-level layout. Shared with the async
/// worker, never mutated after refresh.
pub struct DispatchCore {
    pub refs: Vec<AppenderRef>,
    pub layout: Option<Box<dyn Layout>>,
}

impl DispatchCore {
    /// Sorts refs by the lower bound of their window and chains open upper
    /// bounds, so adjacent refs split the severity scale between them.
    /// Refs sharing a lower bound stay unclipped.
    pub fn new(mut refs: Vec<AppenderRef>, layout: Option<Box<dyn Layout>>) -> Self {
        refs.sort_by_key(|r| r.level.min.code());
        for i in 0..refs.len().saturating_sub(1) {
            let next_min = refs[i + 1].level.min;
            if refs[i].level.max == MAX && next_min > refs[i].level.min {
                refs[i].level.max = next_min;
            }
        }
        Self { refs, layout }
    }

    fn call_appenders(&self, e: &Event) {
        // With a logger layout the event renders once and every matching
        // ref receives the same bytes.
        let mut rendered: Option<Vec<u8>> = None;
        for r in &self.refs {
            if !r.level.enable(e.level) {
                continue;
            }
            let Some(appender) = r.appender() else {
                continue;
            };
            match &self.layout {
                Some(layout) => {
                    let bytes = rendered.get_or_insert_with(|| layout.to_bytes(e));
                    appender.write(bytes);
                }
                None => appender.append(e),
            }
        }
    }

    // Raw bytes carry no severity, so every ref receives them.
    fn write_appenders(&self, b: &[u8]) {
        for r in &self.refs {
            if let Some(appender) = r.appender() {
                appender.write(b);
            }
        }
    }
}

/// Shared configuration of every logger variant.
pub struct BaseLogger {
    pub name: String,
    pub level: LevelRange,
    pub tags: String,
    pub core: Arc<DispatchCore>,
}

impl BaseLogger {
    pub fn new(
        name: impl Into<String>,
        level: LevelRange,
        tags: impl Into<String>,
        refs: Vec<AppenderRef>,
        layout: Option<Box<dyn Layout>>,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            tags: tags.into(),
            core: Arc::new(DispatchCore::new(refs, layout)),
        }
    }
}

/// The interface implemented by all loggers.
pub trait Logger: Send + Sync {
    fn base(&self) -> &BaseLogger;
    fn start(&self) -> Result<()>;
    fn stop(&self);
    /// Take ownership of the event and dispatch it; the logger returns the
    /// event to the pool once every sink has seen it.
    fn publish(&self, e: Box<Event>);
    /// Write raw bytes to the appenders.
    fn write(&self, b: &[u8]);

    fn name(&self) -> &str {
        &self.base().name
    }

    fn enable_level(&self, level: Level) -> bool {
        self.base().level.enable(level)
    }

    /// Events and byte writes dropped under buffer pressure; zero for
    /// loggers without a buffer.
    fn discard_counter(&self) -> u64 {
        0
    }
}

/// Dispatches events inline on the calling thread. The dispatch table is
/// frozen after refresh, so the hot path takes no locks and reentrant
/// publishing from inside a sink cannot deadlock.
pub struct SyncLogger {
    pub base: BaseLogger,
}

impl SyncLogger {
    pub fn new(base: BaseLogger) -> Self {
        Self { base }
    }
}

impl Logger for SyncLogger {
    fn base(&self) -> &BaseLogger {
        &self.base
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn publish(&self, e: Box<Event>) {
        self.base.core.call_appenders(&e);
        put_event(e);
    }

    fn write(&self, b: &[u8]) {
        self.base.core.write_appenders(b);
    }
}

/// Behavior when the async buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferFullPolicy {
    /// Block until space is available
    Block,
    /// Drop the new event or data
    #[default]
    Discard,
    /// Drop the oldest event or data
    DiscardOldest,
}

impl BufferFullPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Block" => Ok(Self::Block),
            "Discard" => Ok(Self::Discard),
            "DiscardOldest" => Ok(Self::DiscardOldest),
            _ => Err(LogError::config(format!("invalid BufferFullPolicy {s}"))),
        }
    }
}

impl fmt::Display for BufferFullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("Block"),
            Self::Discard => f.write_str("Discard"),
            Self::DiscardOldest => f.write_str("DiscardOldest"),
        }
    }
}

enum Msg {
    Event(Box<Event>),
    Bytes(Vec<u8>),
    Stop,
}

/// Buffers events on a bounded channel drained by a single worker thread.
///
/// Within one producer, publish order is preserved; across producers,
/// order follows channel FIFO. `DiscardOldest` may lose earlier events
/// under pressure while `Block` trades delivery for back-pressure.
pub struct AsyncLogger {
    pub base: BaseLogger,
    pub buffer_size: usize,
    pub policy: BufferFullPolicy,

    chan: OnceCell<(Sender<Msg>, Receiver<Msg>)>,
    done: Mutex<Option<Receiver<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    discard_counter: AtomicU64,
}

impl AsyncLogger {
    pub fn new(base: BaseLogger, buffer_size: usize, policy: BufferFullPolicy) -> Self {
        Self {
            base,
            buffer_size,
            policy,
            chan: OnceCell::new(),
            done: Mutex::new(None),
            worker: Mutex::new(None),
            discard_counter: AtomicU64::new(0),
        }
    }

    fn send(&self, msg: Msg) {
        let Some((tx, rx)) = self.chan.get() else {
            release(msg);
            return;
        };
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => self.on_buffer_full(msg, tx, rx),
            Err(TrySendError::Disconnected(msg)) => release(msg),
        }
    }

    fn on_buffer_full(&self, msg: Msg, tx: &Sender<Msg>, rx: &Receiver<Msg>) {
        match self.policy {
            BufferFullPolicy::Block => {
                if let Err(err) = tx.send(msg) {
                    release(err.into_inner());
                }
            }
            BufferFullPolicy::Discard => {
                self.discard_counter.fetch_add(1, Ordering::Relaxed);
                release(msg);
            }
            BufferFullPolicy::DiscardOldest => {
                let mut msg = msg;
                loop {
                    match tx.try_send(msg) {
                        Ok(()) => break,
                        Err(TrySendError::Disconnected(m)) => {
                            release(m);
                            break;
                        }
                        Err(TrySendError::Full(m)) => {
                            msg = m;
                            if let Ok(dropped) = rx.try_recv() {
                                self.discard_counter.fetch_add(1, Ordering::Relaxed);
                                release(dropped);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn release(msg: Msg) {
    if let Msg::Event(e) = msg {
        put_event(e);
    }
}

impl Logger for AsyncLogger {
    fn base(&self) -> &BaseLogger {
        &self.base
    }

    fn start(&self) -> Result<()> {
        if self.buffer_size < 100 {
            return Err(LogError::config("bufferSize is too small"));
        }
        let (tx, rx) = bounded(self.buffer_size);
        let _ = self.chan.set((tx, rx.clone()));
        let (done_tx, done_rx) = bounded::<()>(0);
        *self.done.lock() = Some(done_rx);

        let core = Arc::clone(&self.base.core);
        let handle = thread::spawn(move || {
            let _done = done_tx;
            loop {
                match rx.recv() {
                    Ok(Msg::Event(e)) => {
                        core.call_appenders(&e);
                        put_event(e);
                    }
                    Ok(Msg::Bytes(b)) => core.write_appenders(&b),
                    Ok(Msg::Stop) | Err(_) => break,
                }
            }
        });
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Sends the stop sentinel and awaits the worker; must be called
    /// exactly once, after producers have quiesced.
    fn stop(&self) {
        if let Some((tx, _)) = self.chan.get() {
            let _ = tx.send(Msg::Stop);
        }
        if let Some(done) = self.done.lock().take() {
            // Errors out when the worker drops its end; that is the signal.
            let _ = done.recv();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    fn publish(&self, e: Box<Event>) {
        self.send(Msg::Event(e));
    }

    fn write(&self, b: &[u8]) {
        self.send(Msg::Bytes(b.to_vec()));
    }

    fn discard_counter(&self) -> u64 {
        self.discard_counter.load(Ordering::Relaxed)
    }
}
