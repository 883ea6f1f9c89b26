//! Integration tests for the export pipeline, driven by a scripted writer backend

mod common;

use common::*;
use photovid::{Configuration, Container, Dimensions, ErrorKind, Exporter, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn exporter(backend: &ScriptedBackend, output: PathBuf, fps: u32) -> Exporter {
    let mut exporter = Exporter::with_backend(Box::new(backend.clone()));
    exporter
        .configure(
            Configuration::new(output, Container::Mp4, Dimensions::new(1920, 1080))
                .with_frame_rate(fps),
        )
        .unwrap();
    exporter
}

/// Run an export, collecting every completion call
fn export_collecting(exporter: &Exporter, image: &std::path::Path, seconds: f64) -> Vec<Result<PathBuf>> {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    exporter
        .export(image, seconds, move |result| sink.lock().unwrap().push(result))
        .wait();
    let mut results = results.lock().unwrap();
    std::mem::take(&mut *results)
}

/// Two seconds at 30 fps appends 60 frames at n/30, in order, once each
#[test]
fn test_export_appends_every_frame_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 64, 48);
    let output = temp_dir.path().join("out.mp4");
    let backend = ScriptedBackend::new(3);

    let results = export_collecting(&exporter(&backend, output.clone(), 30), &image, 2.0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap(), &output);

    let log = backend.log.lock().unwrap();
    assert_eq!(log.appended.len(), 60);
    for (i, pts) in log.appended.iter().enumerate() {
        assert_eq!(pts.value(), i as u64);
        assert_eq!(pts.timescale(), 30);
    }
    assert!(log.appended.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(log.appends_while_not_ready, 0);
    assert_eq!(log.appends_after_finished, 0);
    assert_eq!(log.mark_finished_calls, 1);
    assert_eq!(log.finish_calls, 1);

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=60\n");
}

/// Every append happens on the single writing thread
#[test]
fn test_appends_run_on_one_serial_thread() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let backend = ScriptedBackend::new(1);

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 24),
        &image,
        1.5,
    );
    assert!(results[0].is_ok());

    let log = backend.log.lock().unwrap();
    assert_eq!(log.appended.len(), 36);
    assert_eq!(log.append_threads.len(), 1);
    assert!(log.append_threads.contains("photovid-input"));
}

/// A zero duration finalizes without frames and still succeeds
#[test]
fn test_zero_duration_succeeds_without_frames() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let output = temp_dir.path().join("empty.mp4");
    let backend = ScriptedBackend::new(4);

    let results = export_collecting(&exporter(&backend, output.clone(), 30), &image, 0.0);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());

    let log = backend.log.lock().unwrap();
    assert!(log.appended.is_empty());
    assert_eq!(log.mark_finished_calls, 1);
    assert_eq!(log.finish_calls, 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=0\n");
}

/// Negative durations behave like zero
#[test]
fn test_negative_duration_is_zero_frames() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let backend = ScriptedBackend::new(4);

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 30),
        &image,
        -1.0,
    );
    assert!(results[0].is_ok());
    assert!(backend.log.lock().unwrap().appended.is_empty());
}

/// Partial frames are truncated
#[test]
fn test_fractional_duration_truncates() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let backend = ScriptedBackend::new(2);

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 10),
        &image,
        1.99,
    );
    assert!(results[0].is_ok());
    assert_eq!(backend.log.lock().unwrap().appended.len(), 19);
}

/// Exporting twice to the same path replaces the first output
#[test]
fn test_second_export_replaces_first() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let output = temp_dir.path().join("out.mp4");
    let backend = ScriptedBackend::new(4);
    let exporter = exporter(&backend, output.clone(), 30);

    assert!(exporter.export_blocking(&image, 2.0).is_ok());
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=60\n");

    assert!(exporter.export_blocking(&image, 1.0).is_ok());
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=30\n");
    assert_eq!(backend.log.lock().unwrap().writers_created, 2);
}

/// A missing image fails before any output is touched
#[test]
fn test_missing_image_leaves_output_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out.mp4");
    std::fs::write(&output, b"previous").unwrap();
    let backend = ScriptedBackend::new(4);

    let results = export_collecting(
        &exporter(&backend, output.clone(), 30),
        &temp_dir.path().join("missing.png"),
        1.0,
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::ImageLoad);
    assert_eq!(std::fs::read(&output).unwrap(), b"previous");
    assert_eq!(backend.log.lock().unwrap().writers_created, 0);
}

/// A file that is not an image fails to decode
#[test]
fn test_undecodable_image() {
    let temp_dir = TempDir::new().unwrap();
    let bogus = temp_dir.path().join("bogus.png");
    std::fs::write(&bogus, b"not an image").unwrap();
    let output = temp_dir.path().join("out.mp4");
    let backend = ScriptedBackend::new(4);

    let err = exporter(&backend, output.clone(), 30)
        .export_blocking(&bogus, 1.0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageLoad);
    assert!(!output.exists());
}

/// An output path that cannot be removed reports a filesystem error
#[test]
fn test_unremovable_output_is_filesystem_error() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let output = temp_dir.path().join("taken");
    std::fs::create_dir(&output).unwrap();
    let backend = ScriptedBackend::new(4);

    let results = export_collecting(&exporter(&backend, output.clone(), 30), &image, 1.0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::FileSystem);
    assert!(output.is_dir());
}

/// Writer creation failure is reported, not fatal
#[test]
fn test_setup_failure_is_reported_once() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let mut backend = ScriptedBackend::new(4);
    backend.fail_create = true;

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 30),
        &image,
        1.0,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::Setup);
}

/// Append failures stop the export without finalizing
#[test]
fn test_append_failure_stops_writing() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let mut backend = ScriptedBackend::new(2);
    backend.fail_append_at = Some(7);

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 30),
        &image,
        1.0,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::Encoding);

    let log = backend.log.lock().unwrap();
    assert_eq!(log.appended.len(), 7);
    assert_eq!(log.mark_finished_calls, 0);
    assert_eq!(log.finish_calls, 0);
}

/// Finalize failures come back through the completion
#[test]
fn test_finalize_failure_is_reported_once() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let mut backend = ScriptedBackend::new(4);
    backend.fail_finish = true;

    let results = export_collecting(
        &exporter(&backend, temp_dir.path().join("out.mp4"), 30),
        &image,
        0.5,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().kind(), ErrorKind::Encoding);
    assert_eq!(backend.log.lock().unwrap().finish_calls, 1);
}

/// The exporter rejects a bad configuration and non-finite durations
#[test]
fn test_invalid_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let image = png_fixture(temp_dir.path(), "photo.png", 16, 16);
    let backend = ScriptedBackend::new(4);

    let mut exporter = Exporter::with_backend(Box::new(backend.clone()));
    let err = exporter
        .configure(
            Configuration::new(temp_dir.path().join("out.mp4"), Container::Mp4, Dimensions::new(1, 1))
                .with_frame_rate(0),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert!(exporter.configuration().is_none());

    let err = exporter.export_blocking(&image, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

    exporter
        .configure(Configuration::new(
            temp_dir.path().join("out.mp4"),
            Container::Mp4,
            Dimensions::new(1, 1),
        ))
        .unwrap();
    let err = exporter.export_blocking(&image, f64::INFINITY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert_eq!(backend.log.lock().unwrap().writers_created, 0);
}
