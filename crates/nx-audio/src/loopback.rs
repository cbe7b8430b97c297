//! In-process audio-out service.
//!
//! A playback thread consumes appended buffers in order, optionally pacing itself to the stream's
//! real-time duration, then moves each buffer to the released queue and signals the release
//! event. Played samples are counted and can be captured for inspection. Used by tests, the
//! benchmark and the CLI runner.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::buffer::OutputBuffer;
use crate::error::{ServiceError, ServiceOp};
use crate::service::{
    AppendError, AudioIpc, AudioOutput, OutputInfo, OutputName, PcmFormat, ReleaseEvent,
};
use crate::{BYTES_PER_SAMPLE, CHANNEL_COUNT, SAMPLE_RATE};

/// Status codes returned by the loopback service.
pub mod status {
    pub const NOT_INITIALIZED: i32 = 0x0199;
    pub const UNKNOWN_OUTPUT: i32 = 0x0299;
    pub const OUTPUT_CLOSED: i32 = 0x0399;
    pub const NO_PLAYER: i32 = 0x0499;
}

/// Name of the single output exposed by default.
pub const DEFAULT_OUTPUT_NAME: &str = "DeviceOut";

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub output_names: Vec<String>,
    /// Format reported by every opened output.
    pub info: OutputInfo,
    /// Pace playback to the audio duration of each buffer instead of releasing immediately.
    pub realtime: bool,
    /// Keep a copy of every played sample byte.
    pub capture: bool,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            output_names: vec![DEFAULT_OUTPUT_NAME.to_owned()],
            info: OutputInfo {
                sample_rate: SAMPLE_RATE,
                channel_count: CHANNEL_COUNT,
                sample_format: PcmFormat::Int16,
            },
            realtime: false,
            capture: false,
        }
    }
}

/// Counters shared with the playback thread.
#[derive(Debug, Default)]
pub struct LoopbackStats {
    appended: AtomicU64,
    buffers_played: AtomicU64,
    bytes_played: AtomicU64,
    captured: Mutex<Vec<u8>>,
}

impl LoopbackStats {
    /// Buffers accepted by `append_buffer`, including the initial pool.
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Acquire)
    }

    pub fn buffers_played(&self) -> u64 {
        self.buffers_played.load(Ordering::Acquire)
    }

    pub fn bytes_played(&self) -> u64 {
        self.bytes_played.load(Ordering::Acquire)
    }

    /// Played sample bytes, in playback order. Empty unless capture is enabled.
    pub fn captured(&self) -> Vec<u8> {
        lock(&self.captured).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Auto-reset-on-demand event backed by a condition variable.
#[derive(Debug, Clone, Default)]
pub struct LoopbackEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl LoopbackEvent {
    pub fn signal(&self) {
        let (flag, cv) = &*self.inner;
        *lock(flag) = true;
        cv.notify_all();
    }

    pub fn is_signalled(&self) -> bool {
        *lock(&self.inner.0)
    }
}

impl ReleaseEvent for LoopbackEvent {
    fn wait(&self, timeout: Duration) -> bool {
        let (flag, cv) = &*self.inner;
        let guard = lock(flag);
        let (guard, _) = cv
            .wait_timeout_while(guard, timeout, |signalled| !*signalled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn reset(&self) {
        *lock(&self.inner.0) = false;
    }
}

#[derive(Debug, Default)]
struct Queues {
    queued: VecDeque<OutputBuffer>,
    released: VecDeque<OutputBuffer>,
    running: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    queues: Mutex<Queues>,
    wake: Condvar,
}

/// Process-wide loopback service session.
#[derive(Debug)]
pub struct LoopbackIpc {
    config: LoopbackConfig,
    initialized: bool,
    stats: Arc<LoopbackStats>,
}

impl LoopbackIpc {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            initialized: false,
            stats: Arc::new(LoopbackStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LoopbackStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Default for LoopbackIpc {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl AudioIpc for LoopbackIpc {
    type Output = LoopbackOutput;

    fn initialize(&mut self) -> Result<(), ServiceError> {
        self.initialized = true;
        Ok(())
    }

    fn finalize(&mut self) {
        self.initialized = false;
    }

    fn list_outputs(&mut self, max: usize) -> Result<Vec<OutputName>, ServiceError> {
        if !self.initialized {
            return Err(ServiceError::new(
                ServiceOp::ListOutputs,
                status::NOT_INITIALIZED,
            ));
        }
        self.config
            .output_names
            .iter()
            .take(max)
            .map(|name| {
                OutputName::new(name)
                    .map_err(|_| ServiceError::new(ServiceOp::ListOutputs, status::UNKNOWN_OUTPUT))
            })
            .collect()
    }

    fn open_output(&mut self, name: &OutputName) -> Result<LoopbackOutput, ServiceError> {
        if !self.initialized {
            return Err(ServiceError::new(
                ServiceOp::OpenOutput,
                status::NOT_INITIALIZED,
            ));
        }
        if !self
            .config
            .output_names
            .iter()
            .any(|known| known.as_bytes() == name.as_bytes())
        {
            return Err(ServiceError::new(
                ServiceOp::OpenOutput,
                status::UNKNOWN_OUTPUT,
            ));
        }
        LoopbackOutput::spawn(
            self.config.info,
            self.config.realtime,
            self.config.capture,
            Arc::clone(&self.stats),
        )
    }
}

/// One opened loopback output and its playback thread.
#[derive(Debug)]
pub struct LoopbackOutput {
    info: OutputInfo,
    shared: Arc<Shared>,
    event: LoopbackEvent,
    stats: Arc<LoopbackStats>,
    player: Option<JoinHandle<()>>,
}

impl LoopbackOutput {
    fn spawn(
        info: OutputInfo,
        realtime: bool,
        capture: bool,
        stats: Arc<LoopbackStats>,
    ) -> Result<Self, ServiceError> {
        let shared = Arc::new(Shared::default());
        let event = LoopbackEvent::default();

        let player = {
            let shared = Arc::clone(&shared);
            let event = event.clone();
            let stats = Arc::clone(&stats);
            std::thread::Builder::new()
                .name("nx-audio-loopback".into())
                .spawn(move || play(&shared, &event, &stats, realtime, capture))
        };

        Ok(Self {
            info,
            shared,
            event,
            stats,
            player: Some(player_started(player)?),
        })
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.queues).running
    }

    /// Buffers currently queued for playback.
    pub fn queued_len(&self) -> usize {
        lock(&self.shared.queues).queued.len()
    }

    /// Buffers played and waiting to be picked up.
    pub fn released_len(&self) -> usize {
        lock(&self.shared.queues).released.len()
    }

    pub fn stats(&self) -> &LoopbackStats {
        &self.stats
    }
}

/// An output without a playback thread would never release a buffer.
fn player_started(spawned: io::Result<JoinHandle<()>>) -> Result<JoinHandle<()>, ServiceError> {
    spawned.map_err(|err| {
        warn!(%err, "failed to spawn loopback playback thread");
        ServiceError::new(ServiceOp::OpenOutput, status::NO_PLAYER)
    })
}

fn play(
    shared: &Shared,
    event: &LoopbackEvent,
    stats: &LoopbackStats,
    realtime: bool,
    capture: bool,
) {
    let bytes_per_second = SAMPLE_RATE as f64 * CHANNEL_COUNT as f64 * BYTES_PER_SAMPLE as f64;
    loop {
        let buffer = {
            let mut queues = lock(&shared.queues);
            loop {
                if queues.closed {
                    return;
                }
                if queues.running {
                    if let Some(buffer) = queues.queued.pop_front() {
                        break buffer;
                    }
                }
                queues = shared
                    .wake
                    .wait(queues)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let data = buffer.data();
        if realtime && !data.is_empty() {
            std::thread::sleep(Duration::from_secs_f64(
                data.len() as f64 / bytes_per_second,
            ));
        }
        if capture {
            lock(&stats.captured).extend_from_slice(data);
        }
        stats
            .bytes_played
            .fetch_add(data.len() as u64, Ordering::AcqRel);
        stats.buffers_played.fetch_add(1, Ordering::AcqRel);

        {
            let mut queues = lock(&shared.queues);
            if queues.closed {
                return;
            }
            queues.released.push_back(buffer);
        }
        event.signal();
    }
}

impl AudioOutput for LoopbackOutput {
    type Event = LoopbackEvent;

    fn info(&self) -> OutputInfo {
        self.info
    }

    fn register_buffer_event(&mut self) -> Result<LoopbackEvent, ServiceError> {
        Ok(self.event.clone())
    }

    fn append_buffer(&mut self, buffer: OutputBuffer) -> Result<(), AppendError> {
        let mut queues = lock(&self.shared.queues);
        if queues.closed {
            return Err(AppendError {
                error: ServiceError::new(ServiceOp::AppendBuffer, status::OUTPUT_CLOSED),
                buffer,
            });
        }
        queues.queued.push_back(buffer);
        self.stats.appended.fetch_add(1, Ordering::AcqRel);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn get_released_buffer(&mut self) -> Result<Option<OutputBuffer>, ServiceError> {
        let mut queues = lock(&self.shared.queues);
        if queues.closed {
            return Err(ServiceError::new(
                ServiceOp::GetReleasedBuffer,
                status::OUTPUT_CLOSED,
            ));
        }
        Ok(queues.released.pop_front())
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        let mut queues = lock(&self.shared.queues);
        if queues.closed {
            return Err(ServiceError::new(ServiceOp::Start, status::OUTPUT_CLOSED));
        }
        queues.running = true;
        self.shared.wake.notify_all();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        let mut queues = lock(&self.shared.queues);
        if queues.closed {
            return Err(ServiceError::new(ServiceOp::Stop, status::OUTPUT_CLOSED));
        }
        queues.running = false;
        Ok(())
    }

    fn close(&mut self) {
        {
            let mut queues = lock(&self.shared.queues);
            if queues.closed {
                return;
            }
            queues.closed = true;
            queues.running = false;
            queues.queued.clear();
            queues.released.clear();
        }
        self.shared.wake.notify_all();
        if let Some(player) = self.player.take() {
            if player.join().is_err() {
                debug!("loopback playback thread panicked");
            }
        }
    }
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        self.close();
    }
}
