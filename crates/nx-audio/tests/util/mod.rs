#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use nx_audio::{
    AppendError, AudioIpc, AudioOutConfig, AudioOutput, OutputBuffer, OutputInfo, OutputName,
    PageBuf, PcmFormat, ReleaseEvent, ServiceError, ServiceOp, SwitchAudio, CHANNEL_COUNT,
    SAMPLE_RATE,
};

/// Service call as observed by the scripted double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize,
    Finalize,
    ListOutputs,
    OpenOutput(String),
    RegisterBufferEvent,
    Alloc(usize),
    Append { index: usize, data_size: usize },
    GetReleased,
    Wait,
    Reset,
    Start,
    Stop,
    Close,
}

/// Answer to one `get_released_buffer` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Nothing released.
    Empty,
    /// Release the oldest queued buffer.
    Release,
    Fail(i32),
}

#[derive(Debug)]
pub struct Script {
    pub calls: Vec<Call>,
    pub outputs: Vec<String>,
    pub info: OutputInfo,
    /// Buffers owned by the service, oldest first.
    pub queued: VecDeque<OutputBuffer>,
    /// Data of every appended buffer, in append order.
    pub appended: Vec<Vec<u8>>,
    /// Consumed front to back; `default_reply` once empty.
    pub replies: VecDeque<Reply>,
    pub default_reply: Reply,
    pub failures: HashMap<ServiceOp, i32>,
    pub fail_alloc_at: Option<usize>,
    /// Allocations made so far; the next one gets this index.
    pub allocs: usize,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            outputs: vec!["DeviceOut".to_owned()],
            info: OutputInfo {
                sample_rate: SAMPLE_RATE,
                channel_count: CHANNEL_COUNT,
                sample_format: PcmFormat::Int16,
            },
            queued: VecDeque::new(),
            appended: Vec::new(),
            replies: VecDeque::new(),
            default_reply: Reply::Release,
            failures: HashMap::new(),
            fail_alloc_at: None,
            allocs: 0,
        }
    }
}

impl Script {
    fn check(&self, op: ServiceOp) -> Result<(), ServiceError> {
        match self.failures.get(&op) {
            Some(&code) => Err(ServiceError::new(op, code)),
            None => Ok(()),
        }
    }
}

pub type Handle = Rc<RefCell<Script>>;

pub struct ScriptedIpc {
    script: Handle,
}

impl ScriptedIpc {
    pub fn new(script: Script) -> (Self, Handle) {
        let script = Rc::new(RefCell::new(script));
        (
            Self {
                script: Rc::clone(&script),
            },
            script,
        )
    }
}

impl AudioIpc for ScriptedIpc {
    type Output = ScriptedOutput;

    fn initialize(&mut self) -> Result<(), ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::Initialize);
        s.check(ServiceOp::Initialize)
    }

    fn finalize(&mut self) {
        self.script.borrow_mut().calls.push(Call::Finalize);
    }

    fn list_outputs(&mut self, max: usize) -> Result<Vec<OutputName>, ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::ListOutputs);
        s.check(ServiceOp::ListOutputs)?;
        Ok(s.outputs
            .iter()
            .take(max)
            .map(|name| OutputName::new(name).expect("scripted output name fits"))
            .collect())
    }

    fn open_output(&mut self, name: &OutputName) -> Result<ScriptedOutput, ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::OpenOutput(name.to_string()));
        s.check(ServiceOp::OpenOutput)?;
        Ok(ScriptedOutput {
            script: Rc::clone(&self.script),
        })
    }

    fn alloc_buffer_memory(&mut self, size: usize) -> Option<PageBuf> {
        let mut s = self.script.borrow_mut();
        let index = s.allocs;
        s.allocs += 1;
        s.calls.push(Call::Alloc(index));
        if s.fail_alloc_at == Some(index) {
            return None;
        }
        PageBuf::try_new(size)
    }
}

pub struct ScriptedOutput {
    script: Handle,
}

impl AudioOutput for ScriptedOutput {
    type Event = ScriptedEvent;

    fn info(&self) -> OutputInfo {
        self.script.borrow().info
    }

    fn register_buffer_event(&mut self) -> Result<ScriptedEvent, ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::RegisterBufferEvent);
        s.check(ServiceOp::RegisterBufferEvent)?;
        Ok(ScriptedEvent {
            script: Rc::clone(&self.script),
        })
    }

    fn append_buffer(&mut self, buffer: OutputBuffer) -> Result<(), AppendError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::Append {
            index: buffer.index(),
            data_size: buffer.data_size(),
        });
        if let Err(error) = s.check(ServiceOp::AppendBuffer) {
            return Err(AppendError { error, buffer });
        }
        s.appended.push(buffer.data().to_vec());
        s.queued.push_back(buffer);
        Ok(())
    }

    fn get_released_buffer(&mut self) -> Result<Option<OutputBuffer>, ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::GetReleased);
        let reply = s.replies.pop_front().unwrap_or(s.default_reply);
        match reply {
            Reply::Empty => Ok(None),
            Reply::Release => Ok(s.queued.pop_front().map(|mut buffer| {
                // The service reports its own idea of the size; the writer must not trust it.
                buffer.set_buffer_size(0);
                buffer
            })),
            Reply::Fail(code) => Err(ServiceError::new(ServiceOp::GetReleasedBuffer, code)),
        }
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::Start);
        s.check(ServiceOp::Start)
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::Stop);
        s.check(ServiceOp::Stop)
    }

    fn close(&mut self) {
        let mut s = self.script.borrow_mut();
        s.calls.push(Call::Close);
        s.queued.clear();
    }
}

pub struct ScriptedEvent {
    script: Handle,
}

impl ReleaseEvent for ScriptedEvent {
    fn wait(&self, _timeout: Duration) -> bool {
        self.script.borrow_mut().calls.push(Call::Wait);
        true
    }

    fn reset(&self) {
        self.script.borrow_mut().calls.push(Call::Reset);
    }
}

pub fn config(latency_ms: u32, block_frames: bool) -> AudioOutConfig {
    AudioOutConfig {
        latency_ms,
        block_frames,
        ..AudioOutConfig::default()
    }
}

/// Initialize a session over a fresh script and clear the init-time call log.
pub fn session(script: Script, cfg: &AudioOutConfig) -> (SwitchAudio<ScriptedIpc>, Handle) {
    let (ipc, handle) = ScriptedIpc::new(script);
    let (swa, _rate) = SwitchAudio::init(ipc, cfg).expect("init should succeed");
    handle.borrow_mut().calls.clear();
    handle.borrow_mut().appended.clear();
    (swa, handle)
}

pub fn count(handle: &Handle, call: &Call) -> usize {
    handle.borrow().calls.iter().filter(|c| *c == call).count()
}

pub fn appends(handle: &Handle) -> usize {
    handle
        .borrow()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Append { .. }))
        .count()
}

/// Deterministic non-silent PCM bytes.
pub fn pcm(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
