// Symphonia-backed media output: load, decode into a ring, render

use crate::config::{EngineConfig, BUFFER_HIGH_WATER};
use crate::source::open_source;
use parking_lot::Mutex;
use pitch_core::error::BLOCKED_MESSAGE;
use pitch_core::{BindingId, EventSink, MediaOutput, OutputEvent, PlaybackError, Result};
use pitch_decode_symphonia::AudioDecoder;
use pitch_demux_symphonia::Demuxer;
use pitch_renderer::{AudioRenderer, AudioSpec, RenderCallback, RendererFactory};
use pitch_ringbuffer::SharedRingBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// State shared by the control side, the loader thread and the render callback
struct Shared {
    stop: AtomicBool,
    /// Set once the loader is past the network/file fetch
    source_open: AtomicBool,
    playing: AtomicBool,
    decode_done: AtomicBool,
    ended_sent: AtomicBool,
    seek_pending: AtomicBool,
    seek_target: Mutex<f64>,
    frames_played: AtomicU64,
    /// 0 until the source has been probed
    sample_rate: AtomicU64,
    ring: Mutex<Option<SharedRingBuffer>>,
    renderer: Mutex<Option<Box<dyn AudioRenderer>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            source_open: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            decode_done: AtomicBool::new(false),
            ended_sent: AtomicBool::new(false),
            seek_pending: AtomicBool::new(false),
            seek_target: Mutex::new(0.0),
            frames_played: AtomicU64::new(0),
            sample_rate: AtomicU64::new(0),
            ring: Mutex::new(None),
            renderer: Mutex::new(None),
        }
    }

    fn position_seconds(&self) -> f64 {
        match self.sample_rate.load(Ordering::Acquire) {
            0 => 0.0,
            rate => self.frames_played.load(Ordering::Acquire) as f64 / rate as f64,
        }
    }
}

struct ActiveBinding {
    binding: BindingId,
    shared: Arc<Shared>,
    loader: Option<thread::JoinHandle<()>>,
}

/// [`MediaOutput`] that decodes with Symphonia and plays through a [`RendererFactory`]
pub struct SymphoniaOutput {
    config: EngineConfig,
    factory: Arc<dyn RendererFactory>,
    interacted: bool,
    active: Option<ActiveBinding>,
}

impl SymphoniaOutput {
    pub fn new(config: EngineConfig) -> Self {
        let factory: Arc<dyn RendererFactory> = Arc::from(config.renderer_factory());
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: EngineConfig, factory: Arc<dyn RendererFactory>) -> Self {
        log::info!("[engine] Media output created with {} renderer", factory.name());
        Self {
            config,
            factory,
            interacted: false,
            active: None,
        }
    }

    fn shared(&self) -> Result<&Arc<Shared>> {
        self.active
            .as_ref()
            .map(|active| &active.shared)
            .ok_or_else(|| PlaybackError::Output("no source bound".to_string()))
    }
}

impl MediaOutput for SymphoniaOutput {
    fn bind(&mut self, binding: BindingId, uri: &str, sink: EventSink) -> Result<()> {
        self.release()?;

        log::info!("[engine] Binding {} to {}", binding, uri);
        let shared = Arc::new(Shared::new());
        let loader_shared = shared.clone();
        let config = self.config.clone();
        let factory = self.factory.clone();
        let uri = uri.to_string();

        let handle = thread::Builder::new()
            .name(format!("pitch-loader-{}", binding.0))
            .spawn(move || run_loader(&uri, &config, factory.as_ref(), &loader_shared, sink))
            .map_err(|e| PlaybackError::Output(format!("failed to spawn loader thread: {}", e)))?;

        self.active = Some(ActiveBinding {
            binding,
            shared,
            loader: Some(handle),
        });
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.config.require_user_interaction && !self.interacted {
            log::warn!("[engine] Start refused: no user interaction yet");
            return Err(PlaybackError::PlaybackBlocked(BLOCKED_MESSAGE.to_string()));
        }

        let shared = self.shared()?;
        shared.playing.store(true, Ordering::Release);
        let mut renderer = shared.renderer.lock();
        if let Some(renderer) = renderer.as_mut() {
            renderer.start()?;
        }
        log::debug!("[engine] Output started");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let shared = self.shared()?;
        shared.playing.store(false, Ordering::Release);
        let mut renderer = shared.renderer.lock();
        if let Some(renderer) = renderer.as_mut() {
            renderer.pause()?;
        }
        log::debug!("[engine] Output paused");
        Ok(())
    }

    fn seek(&mut self, position_seconds: f64) -> Result<()> {
        let shared = self.shared()?;
        let position = position_seconds.max(0.0);
        let rate = shared.sample_rate.load(Ordering::Acquire);

        *shared.seek_target.lock() = position;
        shared.seek_pending.store(true, Ordering::Release);
        shared
            .frames_played
            .store((position * rate as f64).round() as u64, Ordering::Release);
        shared.ended_sent.store(false, Ordering::Release);
        if let Some(ring) = shared.ring.lock().as_ref() {
            ring.clear();
        }

        log::debug!("[engine] Seek requested: {:.2}s", position);
        Ok(())
    }

    fn user_interacted(&mut self) {
        if !self.interacted {
            log::info!("[engine] User interaction recorded");
        }
        self.interacted = true;
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };

        log::info!("[engine] Releasing binding {}", active.binding);
        active.shared.stop.store(true, Ordering::Release);
        active.shared.playing.store(false, Ordering::Release);

        let renderer = active.shared.renderer.lock().take();
        let renderer_result = match renderer {
            Some(mut renderer) => renderer.release(),
            None => Ok(()),
        };

        // A loader still fetching may sit in a blocking read for the whole
        // transport timeout. It is detached; the stop flag ends it and its
        // stale sink fails on send.
        if let Some(handle) = active.loader.take() {
            if active.shared.source_open.load(Ordering::Acquire) {
                if handle.join().is_err() {
                    log::error!("[engine] Loader thread for {} panicked", active.binding);
                }
            } else {
                log::debug!("[engine] Detaching loader for {} during fetch", active.binding);
            }
        }

        renderer_result
    }
}

impl Drop for SymphoniaOutput {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("[engine] Release on drop failed: {}", e);
        }
    }
}

fn load_failure_reason(err: PlaybackError) -> String {
    match err {
        PlaybackError::ResourceUnavailable { reason, .. } => reason,
        other => other.to_string(),
    }
}

/// Loader thread body: open, probe, create the renderer, then decode until stopped
fn run_loader(uri: &str, config: &EngineConfig, factory: &dyn RendererFactory, shared: &Arc<Shared>, sink: EventSink) {
    let source = match open_source(uri, config, &shared.stop) {
        Ok(source) => source,
        Err(e) => {
            log::error!("[engine] Failed to open {}: {}", uri, e);
            sink.send(OutputEvent::LoadFailed(load_failure_reason(e)));
            return;
        }
    };
    if shared.stop.load(Ordering::Acquire) {
        return;
    }
    shared.source_open.store(true, Ordering::Release);

    let prepared = Demuxer::from_media_source(uri, source, Demuxer::hint_for(uri)).and_then(|demuxer| {
        let info = demuxer.track_info()?;
        let decoder = AudioDecoder::from_demuxer(&demuxer)?;
        Ok((demuxer, decoder, info))
    });
    let (mut demuxer, mut decoder, info) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            log::error!("[engine] Failed to load {}: {}", uri, e);
            sink.send(OutputEvent::LoadFailed(load_failure_reason(e)));
            return;
        }
    };

    let spec = AudioSpec::new(info.sample_rate, decoder.channels());
    let ring = SharedRingBuffer::new(spec.samples_for(config.buffer_seconds.max(1)));
    shared.sample_rate.store(spec.sample_rate as u64, Ordering::Release);
    *shared.ring.lock() = Some(ring.clone());

    let callback = render_callback(spec, ring.clone(), shared.clone(), sink.clone());
    let renderer = match factory.create_renderer(spec, callback) {
        Ok(renderer) => renderer,
        Err(e) => {
            log::error!("[engine] Failed to create {} renderer: {}", factory.name(), e);
            sink.send(OutputEvent::Fatal(e.to_string()));
            return;
        }
    };

    {
        let mut slot = shared.renderer.lock();
        if shared.stop.load(Ordering::Acquire) {
            drop(slot);
            let mut renderer = renderer;
            if let Err(e) = renderer.release() {
                log::warn!("[engine] Renderer release failed: {}", e);
            }
            return;
        }
        let mut renderer = renderer;
        if shared.playing.load(Ordering::Acquire) {
            if let Err(e) = renderer.start() {
                log::error!("[engine] Renderer failed to start: {}", e);
                sink.send(OutputEvent::Fatal(e.to_string()));
            }
        }
        *slot = Some(renderer);
    }

    log::info!(
        "[engine] Loaded {}: {}Hz, {} channels, {:.2}s",
        uri,
        spec.sample_rate,
        spec.channels,
        info.duration_seconds
    );
    sink.send(OutputEvent::MetadataResolved {
        duration_seconds: info.duration_seconds,
    });

    decode_loop(&mut demuxer, &mut decoder, &ring, shared, &sink);
    log::debug!("[engine] Loader thread for {} exited", sink.binding());
}

fn decode_loop(
    demuxer: &mut Demuxer,
    decoder: &mut AudioDecoder,
    ring: &SharedRingBuffer,
    shared: &Shared,
    sink: &EventSink,
) {
    let mut pending: Vec<f32> = Vec::new();
    let mut offset = 0;

    while !shared.stop.load(Ordering::Acquire) {
        if shared.seek_pending.load(Ordering::Acquire) {
            let target = *shared.seek_target.lock();
            pending.clear();
            offset = 0;
            match demuxer.seek(target) {
                Ok(()) => {
                    decoder.reset();
                    shared.decode_done.store(false, Ordering::Release);
                }
                Err(e) => {
                    // Usually a target at or past the end
                    log::warn!("[engine] Seek to {:.2}s failed: {}", target, e);
                    shared.decode_done.store(true, Ordering::Release);
                }
            }
            ring.clear();
            shared.seek_pending.store(false, Ordering::Release);
            continue;
        }

        if offset < pending.len() {
            let written = ring.write(&pending[offset..]);
            offset += written;
            if written == 0 {
                thread::sleep(IDLE_SLEEP);
            }
            continue;
        }

        if shared.decode_done.load(Ordering::Acquire) || ring.fullness() >= BUFFER_HIGH_WATER {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        match demuxer.next_packet() {
            Ok(Some(packet)) => match decoder.decode(&packet) {
                Ok(samples) => {
                    pending = samples;
                    offset = 0;
                }
                Err(e) => {
                    log::error!("[engine] Decoding error: {}", e);
                    sink.send(OutputEvent::Fatal(e.to_string()));
                    return;
                }
            },
            Ok(None) => {
                log::debug!("[engine] Decoder reached end of stream");
                shared.decode_done.store(true, Ordering::Release);
            }
            Err(e) => {
                log::error!("[engine] Demuxing error: {}", e);
                sink.send(OutputEvent::Fatal(e.to_string()));
                return;
            }
        }
    }
}

/// Pulls PCM from the ring, advances the play clock and reports ticks
fn render_callback(spec: AudioSpec, ring: SharedRingBuffer, shared: Arc<Shared>, sink: EventSink) -> RenderCallback {
    let channels = spec.channels as usize;

    Box::new(move |buffer: &mut [f32]| {
        if !shared.playing.load(Ordering::Acquire) || shared.ended_sent.load(Ordering::Acquire) {
            buffer.fill(0.0);
            return;
        }

        let read = ring.read(buffer);
        buffer[read..].fill(0.0);

        let frames = (read / channels) as u64;
        if frames > 0 {
            shared.frames_played.fetch_add(frames, Ordering::AcqRel);
        }

        let drained = read == 0
            && shared.decode_done.load(Ordering::Acquire)
            && !shared.seek_pending.load(Ordering::Acquire)
            && ring.is_empty();

        if drained {
            shared.ended_sent.store(true, Ordering::Release);
            log::info!("[engine] Playback completed");
            sink.send(OutputEvent::Ended);
            return;
        }

        if read < buffer.len() && !shared.decode_done.load(Ordering::Acquire) {
            log::debug!("[engine] Buffer underflow: {} of {} samples", read, buffer.len());
        }

        sink.send(OutputEvent::Tick {
            position_seconds: shared.position_seconds(),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererChoice;
    use crate::create_controller;
    use pitch_core::{AudioPlaybackController, ControllerConfig, ErrorKind, PlaybackStatus};
    use std::path::Path;
    use std::time::Instant;

    /// Mono 16-bit PCM WAV
    fn write_wav(path: &Path, sample_rate: u32, frames: u32) {
        let data_len = frames * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            let sample = ((i % 80) as i16 - 40) * 300;
            out.extend_from_slice(&sample.to_le_bytes());
        }
        std::fs::write(path, out).unwrap();
    }

    fn headless(root: &Path) -> EngineConfig {
        EngineConfig::default()
            .with_asset_root(root)
            .with_renderer(RendererChoice::Headless)
            .with_clock_period(Duration::from_millis(5))
    }

    fn wait_for(controller: &mut AudioPlaybackController, status: PlaybackStatus) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if controller.status() == status {
                return true;
            }
            controller.pump_timeout(Duration::from_millis(20));
        }
        controller.status() == status
    }

    #[test]
    fn test_local_file_plays_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 2000);

        let mut controller = create_controller(ControllerConfig::default(), headless(dir.path()));
        controller.bind("/pitch.wav").unwrap();
        assert_eq!(controller.status(), PlaybackStatus::Loading);

        assert!(wait_for(&mut controller, PlaybackStatus::Ready));
        let duration = controller.duration_seconds().unwrap();
        assert!((duration - 0.25).abs() < 1e-6);
        assert!(controller.seek_enabled());

        controller.play().unwrap();
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        assert!(wait_for(&mut controller, PlaybackStatus::Ended));
        assert_eq!(controller.position_seconds(), 0.0);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = create_controller(ControllerConfig::default(), headless(dir.path()));
        controller.bind_default().unwrap();

        assert!(wait_for(&mut controller, PlaybackStatus::Failed));
        let err = controller.last_error().unwrap();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert!(err.suggests_contact_fallback());

        // play() has nothing to start while failed
        let _ = controller.play();
        assert_eq!(controller.status(), PlaybackStatus::Failed);
    }

    #[test]
    fn test_undecodable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mp3"), vec![0u8; 2048]).unwrap();

        let mut controller = create_controller(ControllerConfig::default(), headless(dir.path()));
        controller.bind("/broken.mp3").unwrap();
        assert!(wait_for(&mut controller, PlaybackStatus::Failed));
        assert_eq!(controller.last_error().unwrap().kind(), ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn test_interaction_gate_blocks_until_gesture() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 8000);

        let mut controller = create_controller(
            ControllerConfig::default(),
            headless(dir.path()).with_interaction_gate(true),
        );
        controller.bind("/pitch.wav").unwrap();
        assert!(wait_for(&mut controller, PlaybackStatus::Ready));

        let err = controller.play().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlaybackBlocked);
        assert_eq!(controller.status(), PlaybackStatus::Paused);

        controller.notify_user_interaction();
        controller.play().unwrap();
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn test_ticks_advance_position_and_pause_holds_it() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 16000);

        let mut controller = create_controller(ControllerConfig::default(), headless(dir.path()));
        controller.bind("/pitch.wav").unwrap();
        assert!(wait_for(&mut controller, PlaybackStatus::Ready));

        controller.play().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.position_seconds() < 0.2 && Instant::now() < deadline {
            controller.pump_timeout(Duration::from_millis(20));
        }
        assert!(controller.position_seconds() >= 0.2);

        controller.pause().unwrap();
        controller.pump();
        let held = controller.position_seconds();
        std::thread::sleep(Duration::from_millis(50));
        controller.pump();
        assert_eq!(controller.position_seconds(), held);
        assert!(held < 2.0);
    }

    #[test]
    fn test_seek_then_resume_reaches_end() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 16000);

        let mut controller = create_controller(ControllerConfig::default(), headless(dir.path()));
        controller.bind("/pitch.wav").unwrap();
        assert!(wait_for(&mut controller, PlaybackStatus::Ready));

        controller.seek(1.8).unwrap();
        assert!((controller.position_seconds() - 1.8).abs() < 1e-9);

        controller.play().unwrap();
        assert!(wait_for(&mut controller, PlaybackStatus::Ended));
    }

    #[test]
    fn test_release_joins_loader() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 8000);

        let mut output = SymphoniaOutput::new(headless(dir.path()));
        let (tx, rx) = std::sync::mpsc::channel();
        let binding = BindingId(1);
        output
            .bind(binding, "/pitch.wav", EventSink::new(binding, tx))
            .unwrap();

        let (_, first) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, OutputEvent::MetadataResolved { .. }));

        output.release().unwrap();
        assert!(output.start().is_err());
        // Loader and renderer are gone, so every sender has been dropped
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_unbind_during_stalled_download_returns_promptly() {
        use std::net::TcpListener;

        // Accepts the connection and never answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let held: Vec<_> = listener.incoming().take(4).filter_map(|conn| conn.ok()).collect();
            std::thread::sleep(Duration::from_secs(10));
            drop(held);
        });

        let engine = EngineConfig {
            http_retries: 0,
            renderer: RendererChoice::Headless,
            ..EngineConfig::default()
        };
        let mut controller = create_controller(ControllerConfig::default(), engine);
        controller
            .bind(&format!("http://127.0.0.1:{}/elevator-pitch.mp3", port))
            .unwrap();
        std::thread::sleep(Duration::from_millis(300));
        controller.pump();
        assert_eq!(controller.status(), PlaybackStatus::Loading);

        let started = Instant::now();
        controller.unbind();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(controller.status(), PlaybackStatus::Unloaded);

        // Rebinding to a local file is not held up by the stalled loader either
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 2000);
        let path = dir.path().join("pitch.wav");
        let started = Instant::now();
        controller.bind(path.to_str().unwrap()).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(wait_for(&mut controller, PlaybackStatus::Ready));
    }
}
