//! Abnormality classification for sensor readings
//!
//! A reading is abnormal when any measurement leaves its closed threshold
//! interval. The abnormal-history label is the first violated measurement in
//! priority order temperature, humidity, soil moisture, so a reading that
//! violates several thresholds at once is reported under the highest-priority
//! one only.

mod threshold_detector;

pub use threshold_detector::{Bounds, ThresholdDetector, Thresholds};
