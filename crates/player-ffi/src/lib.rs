// C ABI for the elevator-pitch player
//
// Controllers live in a registry keyed by id. Facility events are applied when
// the host calls `pitch_player_pump`, typically once per UI frame.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pitch_core::{format_time, AudioPlaybackController, ControllerConfig, ErrorKind, PlaybackError, PlaybackStatus, Result};
use pitch_engine::{create_controller, EngineConfig};
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::Once;

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, AudioPlaybackController>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        // RUST_LOG overrides the default level
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(false)
            .try_init();
    });
}

fn register_player(controller: AudioPlaybackController) -> i64 {
    init_logging();
    let mut next = NEXT_PLAYER_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    PLAYER_REGISTRY.lock().insert(id, controller);
    log::info!("Player {} created", id);
    id
}

fn invalid_id() -> PlaybackError {
    PlaybackError::Output("Invalid player ID".to_string())
}

fn with_player_mut<R>(id: i64, f: impl FnOnce(&mut AudioPlaybackController) -> Result<R>) -> Result<R> {
    let mut registry = PLAYER_REGISTRY.lock();
    let player = registry.get_mut(&id).ok_or_else(invalid_id)?;
    f(player)
}

fn with_player<R>(id: i64, f: impl FnOnce(&AudioPlaybackController) -> R) -> Result<R> {
    let registry = PLAYER_REGISTRY.lock();
    let player = registry.get(&id).ok_or_else(invalid_id)?;
    Ok(f(player))
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn status_code(status: PlaybackStatus) -> i32 {
    match status {
        PlaybackStatus::Unloaded => 0,
        PlaybackStatus::Loading => 1,
        PlaybackStatus::Ready => 2,
        PlaybackStatus::Playing => 3,
        PlaybackStatus::Paused => 4,
        PlaybackStatus::Ended => 5,
        PlaybackStatus::Failed => 6,
    }
}

fn error_code(kind: Option<ErrorKind>) -> i32 {
    match kind {
        None => 0,
        Some(ErrorKind::ResourceUnavailable) => 1,
        Some(ErrorKind::PlaybackBlocked) => 2,
        Some(ErrorKind::Output) => 3,
    }
}

/// Borrow a C string; `None` for null or non-UTF-8 input
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn engine_config(asset_root: *const c_char, require_interaction: bool) -> EngineConfig {
    let mut config = EngineConfig::default().with_interaction_gate(require_interaction);
    if let Some(root) = c_str(asset_root).filter(|root| !root.is_empty()) {
        config.asset_root = Some(PathBuf::from(root));
    }
    config
}

// -------------------------------
// Lifecycle
// -------------------------------

/// Create a player. `asset_root` may be null; site paths then resolve from `/`.
#[no_mangle]
pub extern "C" fn pitch_player_create(asset_root: *const c_char) -> i64 {
    register_player(create_controller(
        ControllerConfig::default(),
        engine_config(asset_root, false),
    ))
}

/// Create a player whose output refuses to start until
/// `pitch_player_user_interaction` was called
#[no_mangle]
pub extern "C" fn pitch_player_create_with_interaction_gate(asset_root: *const c_char, require_interaction: i32) -> i64 {
    register_player(create_controller(
        ControllerConfig::default(),
        engine_config(asset_root, require_interaction != 0),
    ))
}

#[no_mangle]
pub extern "C" fn pitch_player_release(player_id: i64) -> i32 {
    // Drop outside the registry lock; teardown joins worker threads
    let removed = PLAYER_REGISTRY.lock().remove(&player_id);
    match removed {
        Some(mut controller) => {
            controller.unbind();
            drop(controller);
            log::info!("Player {} released", player_id);
            0
        }
        None => -1,
    }
}

// -------------------------------
// Source binding
// -------------------------------

#[no_mangle]
pub extern "C" fn pitch_player_bind(player_id: i64, uri: *const c_char) -> i32 {
    match c_str(uri) {
        Some(uri) => to_code(with_player_mut(player_id, |p| p.bind(uri))),
        None => -1,
    }
}

#[no_mangle]
pub extern "C" fn pitch_player_bind_default(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.bind_default()))
}

// -------------------------------
// Transport
// -------------------------------

#[no_mangle]
pub extern "C" fn pitch_player_play(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.play()))
}

#[no_mangle]
pub extern "C" fn pitch_player_pause(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.pause()))
}

#[no_mangle]
pub extern "C" fn pitch_player_toggle(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.toggle()))
}

#[no_mangle]
pub extern "C" fn pitch_player_seek(player_id: i64, position_seconds: f64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.seek(position_seconds)))
}

#[no_mangle]
pub extern "C" fn pitch_player_skip_by(player_id: i64, delta_seconds: f64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.skip_by(delta_seconds)))
}

#[no_mangle]
pub extern "C" fn pitch_player_skip_forward(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.skip_forward()))
}

#[no_mangle]
pub extern "C" fn pitch_player_skip_backward(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.skip_backward()))
}

#[no_mangle]
pub extern "C" fn pitch_player_user_interaction(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| {
        p.notify_user_interaction();
        Ok(())
    }))
}

/// Apply queued facility events; returns how many were handled, -1 for a bad id
#[no_mangle]
pub extern "C" fn pitch_player_pump(player_id: i64) -> i32 {
    match with_player_mut(player_id, |p| Ok(p.pump())) {
        Ok(handled) => handled.min(i32::MAX as usize) as i32,
        Err(err) => {
            log::error!("Failed to pump events: {}", err);
            -1
        }
    }
}

// -------------------------------
// Queries
// -------------------------------

#[no_mangle]
pub extern "C" fn pitch_player_get_status(player_id: i64) -> i32 {
    match with_player(player_id, |p| p.status()) {
        Ok(status) => status_code(status),
        Err(err) => {
            log::error!("Failed to get status: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn pitch_player_get_position(player_id: i64) -> f64 {
    match with_player(player_id, |p| p.position_seconds()) {
        Ok(position) => position,
        Err(err) => {
            log::error!("Failed to get position: {}", err);
            -1.0
        }
    }
}

/// Duration in seconds; 0 while unknown
#[no_mangle]
pub extern "C" fn pitch_player_get_duration(player_id: i64) -> f64 {
    match with_player(player_id, |p| p.duration_seconds().unwrap_or(0.0)) {
        Ok(duration) => duration,
        Err(err) => {
            log::error!("Failed to get duration: {}", err);
            -1.0
        }
    }
}

#[no_mangle]
pub extern "C" fn pitch_player_get_error_kind(player_id: i64) -> i32 {
    match with_player(player_id, |p| p.last_error().map(|e| e.kind())) {
        Ok(kind) => error_code(kind),
        Err(err) => {
            log::error!("Failed to get error: {}", err);
            -1
        }
    }
}

/// Copy `text` into a caller buffer with a NUL terminator.
/// Returns the length without the terminator, or -1 when it does not fit.
fn write_c_string(text: &str, buffer: *mut c_char, buffer_len: usize) -> i32 {
    let bytes = text.as_bytes();
    if buffer.is_null() || buffer_len <= bytes.len() {
        return -1;
    }

    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, bytes.len());
        *buffer.add(bytes.len()) = 0;
    }
    bytes.len() as i32
}

/// Contact path to offer after an unrecoverable error.
/// Writes it into `buffer` and returns its length; 0 when there is nothing to
/// offer, -1 for a bad id or a buffer that is too small.
#[no_mangle]
pub extern "C" fn pitch_player_get_fallback_hint(player_id: i64, buffer: *mut c_char, buffer_len: usize) -> i32 {
    match with_player(player_id, |p| p.fallback_hint().map(str::to_string)) {
        Ok(Some(hint)) => write_c_string(&hint, buffer, buffer_len),
        Ok(None) => 0,
        Err(err) => {
            log::error!("Failed to get fallback hint: {}", err);
            -1
        }
    }
}

/// Write `m:ss` for `seconds` into `buffer` (NUL-terminated).
/// Returns the length without the terminator, or -1 when it does not fit.
#[no_mangle]
pub extern "C" fn pitch_player_format_time(seconds: f64, buffer: *mut c_char, buffer_len: usize) -> i32 {
    write_c_string(&format_time(seconds), buffer, buffer_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Mono 16-bit PCM WAV of silence
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
        out.resize(44 + data_len as usize, 0);
        std::fs::write(path, out).unwrap();
    }

    fn wait_for_status(id: i64, code: i32) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            pitch_player_pump(id);
            if pitch_player_get_status(id) == code {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_invalid_id_returns_error_codes() {
        assert_eq!(pitch_player_play(-42), -1);
        assert_eq!(pitch_player_get_status(-42), -1);
        assert_eq!(pitch_player_get_position(-42), -1.0);
        assert_eq!(pitch_player_pump(-42), -1);
        assert_eq!(pitch_player_release(-42), -1);
    }

    #[test]
    fn test_new_player_is_unloaded() {
        let id = pitch_player_create(std::ptr::null());
        assert_eq!(pitch_player_get_status(id), 0);
        assert_eq!(pitch_player_get_error_kind(id), 0);
        assert_eq!(pitch_player_get_duration(id), 0.0);
        assert_eq!(pitch_player_bind(id, std::ptr::null()), -1);
        assert_eq!(pitch_player_release(id), 0);
        assert_eq!(pitch_player_release(id), -1);
    }

    #[test]
    fn test_missing_default_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = CString::new(dir.path().to_str().unwrap()).unwrap();
        let id = pitch_player_create(root.as_ptr());

        assert_eq!(pitch_player_bind_default(id), 0);
        assert!(wait_for_status(id, 6));
        assert_eq!(pitch_player_get_error_kind(id), 1);

        let mut hint = [0 as c_char; 32];
        assert_eq!(pitch_player_get_fallback_hint(id, hint.as_mut_ptr(), hint.len()), 9);
        let text = unsafe { CStr::from_ptr(hint.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "/#contact");
        assert_eq!(pitch_player_release(id), 0);
    }

    #[test]
    fn test_gated_player_plays_after_interaction() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("pitch.wav"), 8000, 4000);
        let root = CString::new(dir.path().to_str().unwrap()).unwrap();
        let uri = CString::new("/pitch.wav").unwrap();

        let id = pitch_player_create_with_interaction_gate(root.as_ptr(), 1);
        assert_eq!(pitch_player_bind(id, uri.as_ptr()), 0);
        assert!(wait_for_status(id, 2));
        assert!((pitch_player_get_duration(id) - 0.5).abs() < 1e-6);

        assert_eq!(pitch_player_play(id), -1);
        assert_eq!(pitch_player_get_status(id), 4);
        assert_eq!(pitch_player_get_error_kind(id), 2);
        let mut hint = [0 as c_char; 32];
        assert_eq!(pitch_player_get_fallback_hint(id, hint.as_mut_ptr(), hint.len()), 0);

        assert_eq!(pitch_player_user_interaction(id), 0);
        assert_eq!(pitch_player_toggle(id), 0);
        assert_eq!(pitch_player_get_status(id), 3);
        assert!(wait_for_status(id, 5));
        assert_eq!(pitch_player_release(id), 0);
    }

    #[test]
    fn test_format_time_into_buffer() {
        let mut buffer = [0 as c_char; 16];
        let written = pitch_player_format_time(125.4, buffer.as_mut_ptr(), buffer.len());
        assert_eq!(written, 4);
        let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "2:05");

        let mut tiny = [0 as c_char; 4];
        assert_eq!(pitch_player_format_time(125.4, tiny.as_mut_ptr(), tiny.len()), -1);
        assert_eq!(pitch_player_format_time(1.0, std::ptr::null_mut(), 8), -1);
    }
}
