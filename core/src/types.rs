//! Shared primitive types used across the pipeline.

/// A family id. One value per dataset is reserved for background traffic.
pub type Label = u32;

/// The background ("not ransomware") label used by the Bitcoin heist dataset.
pub const DEFAULT_BACKGROUND_LABEL: Label = 28;

/// Detector target for background rows.
pub const DETECTOR_BACKGROUND: Label = 0;

/// Detector target for ransomware rows.
pub const DETECTOR_RANSOMWARE: Label = 1;

/// A Bitcoin address as it appears in the dataset.
pub type Address = String;
