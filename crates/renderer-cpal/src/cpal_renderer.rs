// cpal-based audio renderer
//
// cpal streams are not Send, so the stream lives on a dedicated thread and is
// driven through a command channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use pitch_core::{PlaybackError, Result};
use pitch_renderer::{AudioRenderer, AudioSpec, RenderCallback};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

enum Command {
    Play(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
    Shutdown,
}

/// cpal audio renderer
pub struct CpalRenderer {
    spec: AudioSpec,
    commands: Sender<Command>,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CpalRenderer {
    pub fn new(spec: AudioSpec, callback: RenderCallback) -> Result<Self> {
        let (commands, command_rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let running = Arc::new(AtomicBool::new(false));
        let running_clone = running.clone();

        let handle = thread::Builder::new()
            .name("pitch-cpal-renderer".to_string())
            .spawn(move || {
                let stream = match build_stream(spec, callback, running_clone) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for command in command_rx {
                    match command {
                        Command::Play(reply) => {
                            let result = stream
                                .play()
                                .map_err(|e| PlaybackError::Output(format!("Failed to start stream: {}", e)));
                            let _ = reply.send(result);
                        }
                        Command::Pause(reply) => {
                            let result = stream
                                .pause()
                                .map_err(|e| PlaybackError::Output(format!("Failed to pause stream: {}", e)));
                            let _ = reply.send(result);
                        }
                        Command::Shutdown => break,
                    }
                }

                log::debug!("cpal stream dropped");
            })
            .map_err(|e| PlaybackError::Output(format!("failed to spawn renderer thread: {}", e)))?;

        let ready = ready_rx
            .recv()
            .map_err(|_| PlaybackError::Output("renderer thread exited during setup".to_string()))
            .and_then(|result| result);
        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        log::info!("Audio stream initialized: {}Hz, {} channels", spec.sample_rate, spec.channels);

        Ok(Self {
            spec,
            commands,
            running,
            thread: Some(handle),
        })
    }

    fn request(&self, make: fn(Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| PlaybackError::Output("renderer thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| PlaybackError::Output("renderer thread is gone".to_string()))?
    }
}

fn build_stream(spec: AudioSpec, mut callback: RenderCallback, running: Arc<AtomicBool>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::Output("No output device available".to_string()))?;

    log::info!(
        "Using audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config = StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                callback(data);
            },
            |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| PlaybackError::Output(format!("Failed to build output stream: {}", e)))
}

impl AudioRenderer for CpalRenderer {
    fn start(&mut self) -> Result<()> {
        self.request(Command::Play)?;
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        self.request(Command::Pause)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn release(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            handle
                .join()
                .map_err(|_| PlaybackError::Output("renderer thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for CpalRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("cpal renderer release failed: {}", e);
        }
    }
}
