use crate::error::Result;
use crate::service::AudioIpc;
use crate::switch::SwitchAudio;
use crate::DRIVER_IDENT;

/// Audio backend as seen by the frontend.
///
/// Object safe so that backends can be registered as `Box<dyn AudioDriver>`.
pub trait AudioDriver {
    fn ident(&self) -> &'static str;

    /// Queue interleaved sample bytes. See [`SwitchAudio::write`].
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn stop(&mut self) -> Result<()>;

    fn start(&mut self, is_shutdown: bool) -> Result<()>;

    fn alive(&self) -> bool;

    fn set_nonblock_state(&mut self, nonblock: bool);

    /// Whether the backend wants `f32` samples instead of `i16`.
    fn use_float(&self) -> bool;

    fn write_avail(&self) -> usize;

    fn buffer_size(&self) -> usize;

    /// Selectable devices, if the backend supports choosing one.
    fn device_list(&self) -> Option<Vec<String>> {
        None
    }
}

impl<I: AudioIpc> AudioDriver for SwitchAudio<I> {
    fn ident(&self) -> &'static str {
        DRIVER_IDENT
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        SwitchAudio::write(self, buf)
    }

    fn stop(&mut self) -> Result<()> {
        SwitchAudio::stop(self)
    }

    fn start(&mut self, is_shutdown: bool) -> Result<()> {
        SwitchAudio::start(self, is_shutdown)
    }

    fn alive(&self) -> bool {
        SwitchAudio::alive(self)
    }

    fn set_nonblock_state(&mut self, nonblock: bool) {
        SwitchAudio::set_nonblock_state(self, nonblock)
    }

    fn use_float(&self) -> bool {
        SwitchAudio::use_float(self)
    }

    fn write_avail(&self) -> usize {
        SwitchAudio::write_avail(self)
    }

    fn buffer_size(&self) -> usize {
        SwitchAudio::buffer_size(self)
    }
}
