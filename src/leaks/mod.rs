//! Leak detection

pub mod detector;

pub use detector::{
    estimated_object_size, leak_confidence, LeakDetector, LeakRecord, CONFIDENCE_FLOOR,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
