//! The alignment advisory goes through the `log` facade.
//!
//! Kept in its own test binary because a logger can be installed only once
//! per process.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use tenseg_ad::resize::resize;
use tenseg_core::{DenseND, InterpolationMode};

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

fn warnings_during<F: FnOnce()>(f: F) -> Vec<String> {
    if let Ok(mut records) = LOGGER.records.lock() {
        records.clear();
    }
    f();
    LOGGER
        .records
        .lock()
        .map(|records| {
            records
                .iter()
                .filter(|(level, _)| *level == Level::Warn)
                .map(|(_, msg)| msg.clone())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_advisory_emitted_only_for_off_grid_upsampling() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);
    let bilinear = InterpolationMode::Bilinear;

    // 10 -> 15: 14 % 9 != 0
    let x = DenseND::<f64>::ones(&[1, 1, 10, 10]);
    let warnings = warnings_during(|| {
        let y = resize(&x, Some((15.0, 15.0)), None, bilinear, Some(true), true).unwrap();
        assert_eq!(y.shape(), &[1, 1, 15, 15]);
    });
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("(10, 10)"));
    assert!(warnings[0].contains("(15, 15)"));

    // 9 -> 17: 16 % 8 == 0
    let x = DenseND::<f64>::ones(&[1, 1, 9, 9]);
    let warnings = warnings_during(|| {
        resize(&x, Some((17.0, 17.0)), None, bilinear, Some(true), true).unwrap();
    });
    assert!(warnings.is_empty());

    // Off-grid but silenced, or not aligning corners
    let x = DenseND::<f64>::ones(&[1, 1, 10, 10]);
    let warnings = warnings_during(|| {
        resize(&x, Some((15.0, 15.0)), None, bilinear, Some(true), false).unwrap();
        resize(&x, Some((15.0, 15.0)), None, bilinear, Some(false), true).unwrap();
        resize(&x, None, Some(1.5.into()), bilinear, Some(true), true).unwrap();
    });
    assert!(warnings.is_empty());
}
