// Headless renderer: consumes PCM in real time without a device

use crate::{AudioRenderer, AudioSpec, RenderCallback, RendererFactory};
use pitch_core::{PlaybackError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default callback period
pub const DEFAULT_CLOCK_PERIOD: Duration = Duration::from_millis(10);

/// Drives the render callback from a timer thread at a fixed period
pub struct ClockRenderer {
    spec: AudioSpec,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ClockRenderer {
    pub fn new(spec: AudioSpec, period: Duration, mut callback: RenderCallback) -> Result<Self> {
        let period = period.max(Duration::from_millis(1));
        let frames = ((spec.sample_rate as u128 * period.as_micros()) / 1_000_000).max(1) as usize;
        let running = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let running_clone = running.clone();
        let stop_clone = stop.clone();

        let handle = thread::Builder::new()
            .name("pitch-clock-renderer".to_string())
            .spawn(move || {
                let mut buffer = vec![0.0f32; frames * spec.channels as usize];
                let mut next_tick = Instant::now() + period;

                while !stop_clone.load(Ordering::Acquire) {
                    if running_clone.load(Ordering::Acquire) {
                        callback(&mut buffer);
                    }

                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                        next_tick += period;
                    } else {
                        // Fell behind; do not try to catch up in a burst
                        next_tick = now + period;
                    }
                }
            })
            .map_err(|e| PlaybackError::Output(format!("failed to spawn clock renderer: {}", e)))?;

        log::debug!(
            "Clock renderer started: {}Hz, {} channels, {} frames per {:?}",
            spec.sample_rate,
            spec.channels,
            frames,
            period
        );

        Ok(Self {
            spec,
            running,
            stop,
            thread: Some(handle),
        })
    }
}

impl AudioRenderer for ClockRenderer {
    fn start(&mut self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn release(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| PlaybackError::Output("clock renderer thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ClockRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Clock renderer release failed: {}", e);
        }
    }
}

/// Factory for [`ClockRenderer`]
#[derive(Debug, Clone, Copy)]
pub struct ClockRendererFactory {
    pub period: Duration,
}

impl Default for ClockRendererFactory {
    fn default() -> Self {
        Self {
            period: DEFAULT_CLOCK_PERIOD,
        }
    }
}

impl RendererFactory for ClockRendererFactory {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn create_renderer(&self, spec: AudioSpec, callback: RenderCallback) -> Result<Box<dyn AudioRenderer>> {
        Ok(Box::new(ClockRenderer::new(spec, self.period, callback)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_callback_only_runs_while_started() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut renderer = ClockRenderer::new(
            AudioSpec::new(8000, 1),
            Duration::from_millis(2),
            Box::new(move |buffer: &mut [f32]| {
                assert_eq!(buffer.len(), 16);
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        renderer.start().unwrap();
        assert!(renderer.is_running());
        thread::sleep(Duration::from_millis(40));
        renderer.pause().unwrap();
        let after_pause = calls.load(Ordering::SeqCst);
        assert!(after_pause > 0);

        renderer.release().unwrap();
        thread::sleep(Duration::from_millis(10));
        assert!(calls.load(Ordering::SeqCst) <= after_pause + 1);
    }
}
