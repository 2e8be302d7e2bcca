//! Tracker configuration.
//!
//! All tuning constants are fixed calibration values; see [`defaults`].
//! There is deliberately no runtime config file: the scoring and
//! segmentation constants interact, and field-tuning individual values
//! produces incomparable score histories between devices.

pub mod defaults;
