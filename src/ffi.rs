//! FFI (Foreign Function Interface) for C/Go interoperability

use crate::error::ErrorCode;
use crate::{available, Configuration, Container, Dimensions, Exporter, FfmpegBackend};
use libc::{c_char, c_double, c_void};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;

/// FFI result structure
#[repr(C)]
pub struct FfiResult {
    pub code: ErrorCode,
    pub message: *mut c_char,
}

impl FfiResult {
    fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: ptr::null_mut(),
        }
    }

    fn error(code: ErrorCode, message: &str) -> Self {
        let c_message = CString::new(message)
            .or_else(|_| CString::new(message.replace('\0', " ")))
            .unwrap_or_default();
        Self {
            code,
            message: c_message.into_raw(),
        }
    }

    fn from_result(result: crate::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => {
                let path = path.to_string_lossy();
                let mut ok = Self::ok();
                if let Ok(message) = CString::new(path.as_bytes()) {
                    ok.message = message.into_raw();
                }
                ok
            }
            Err(e) => Self::error(ErrorCode::from(&e), &e.to_string()),
        }
    }
}

/// Completion callback for [`photovid_export`]
///
/// Called exactly once, possibly from another thread. On success `result.message`
/// holds the output path. Release the result with [`photovid_free_result`].
pub type FfiCompletion = extern "C" fn(result: FfiResult, user_data: *mut c_void);

/// Caller-owned pointer handed back through the completion
struct UserData(*mut c_void);

// The caller guarantees `user_data` may be used from the completion's thread.
unsafe impl Send for UserData {}

unsafe fn optional_str<'a>(ptr: *const c_char, what: &str) -> Result<Option<&'a str>, FfiResult> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| FfiResult::error(ErrorCode::InvalidConfiguration, &format!("Invalid {}", what)))
}

unsafe fn required_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, FfiResult> {
    optional_str(ptr, what)?.ok_or_else(|| {
        FfiResult::error(ErrorCode::InvalidConfiguration, &format!("{} is null", what))
    })
}

/// Check if H.264 encoding is available
///
/// # Safety
/// - `ffmpeg_path` must be a valid null-terminated string or null
#[no_mangle]
pub unsafe extern "C" fn photovid_available(ffmpeg_path: *const c_char) -> FfiResult {
    let ffmpeg_path = match optional_str(ffmpeg_path, "ffmpeg path") {
        Ok(path) => path,
        Err(result) => return result,
    };

    match available(ffmpeg_path.map(Path::new)) {
        Ok(_) => FfiResult::ok(),
        Err(e) => FfiResult::error(ErrorCode::from(&e), &e.to_string()),
    }
}

/// Export a still image as a video of `duration_seconds`
///
/// The returned result only reports invalid arguments; the export outcome is
/// delivered to `completion` exactly once. When the returned code is not `Ok`,
/// `completion` is not called.
///
/// # Safety
/// - `image_path` and `output_path` must be valid null-terminated strings
/// - `ffmpeg_path` must be a valid null-terminated string or null
/// - `user_data` is passed through untouched and must stay valid until `completion` runs
#[no_mangle]
pub unsafe extern "C" fn photovid_export(
    image_path: *const c_char,
    output_path: *const c_char,
    container: Container,
    duration_seconds: c_double,
    frame_rate: u32,
    ffmpeg_path: *const c_char,
    completion: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> FfiResult {
    let Some(completion) = completion else {
        return FfiResult::error(ErrorCode::InvalidConfiguration, "Completion is null");
    };

    let (image_path, output_path, ffmpeg_path) = match (
        required_str(image_path, "image path"),
        required_str(output_path, "output path"),
        optional_str(ffmpeg_path, "ffmpeg path"),
    ) {
        (Ok(image), Ok(output), Ok(ffmpeg)) => (image, output, ffmpeg),
        (Err(result), _, _) | (_, Err(result), _) | (_, _, Err(result)) => return result,
    };

    let mut backend = FfmpegBackend::new();
    if let Some(ffmpeg_path) = ffmpeg_path {
        backend = backend.with_ffmpeg_path(ffmpeg_path);
    }

    // Dimensions are replaced by the image's own size at export time
    let configuration = Configuration::new(output_path, container, Dimensions::new(1, 1))
        .with_frame_rate(frame_rate);

    let mut exporter = Exporter::with_backend(Box::new(backend));
    if let Err(e) = exporter.configure(configuration) {
        return FfiResult::error(ErrorCode::from(&e), &e.to_string());
    }

    let user_data = UserData(user_data);
    exporter.export(image_path, duration_seconds, move |result| {
        let user_data = user_data;
        completion(FfiResult::from_result(result), user_data.0);
    });

    FfiResult::ok()
}

/// Free a result's message string
///
/// # Safety
/// - `result` must point to a valid `FfiResult` that was returned by a photovid function
#[no_mangle]
pub unsafe extern "C" fn photovid_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }

    let result = &mut *result;
    if !result.message.is_null() {
        // Reclaim the CString and let it drop
        let _ = CString::from_raw(result.message);
        result.message = ptr::null_mut();
    }
}

/// Get version string
#[no_mangle]
pub extern "C" fn photovid_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
