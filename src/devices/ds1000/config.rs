use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::vxi11::{LinkOptions, DEFAULT_DEVICE_NAME, DEFAULT_IO_TIMEOUT_MS, DEFAULT_LOCK_TIMEOUT_MS};

pub const DEFAULT_NAME:&str = "ds1000";
pub const DEFAULT_EXPECTED_MODEL:&str = "DS1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ds1000Config {
	/// Instance name; also scopes the log target to `ds1000::<name>`.
	pub name: String,
	/// Substring the model field of `*IDN?` has to contain. `None` accepts anything.
	pub expected_model: Option<String>,
	/// Pause before every transmission, for firmware that drops commands sent back to back.
	pub tx_throttle_ms: u64,
	pub io_timeout_ms: u32,
	pub lock_timeout_ms: u32,
	/// VXI-11 logical device name.
	pub device: String,
}

impl Default for Ds1000Config {
	fn default() -> Self {
		Self {
			name: DEFAULT_NAME.to_owned(),
			expected_model: Some(DEFAULT_EXPECTED_MODEL.to_owned()),
			tx_throttle_ms: 0,
			io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
			lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
			device: DEFAULT_DEVICE_NAME.to_owned(),
		}
	}
}

impl Ds1000Config {
	pub fn from_json(text:&str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| Error::InvalidArgument{
			parameter: "config".to_owned(),
			value: text.to_owned(),
			reason: e.to_string(),
		})
	}

	pub fn link_options(&self) -> LinkOptions {
		LinkOptions {
			device: self.device.clone(),
			io_timeout_ms: self.io_timeout_ms,
			lock_timeout_ms: self.lock_timeout_ms,
		}
	}

	pub fn log_target(&self) -> String { format!("{}::{}", DEFAULT_NAME, self.name) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_fields_take_defaults() {
		let config = Ds1000Config::from_json(r#"{ "name": "bench", "tx_throttle_ms": 50 }"#).unwrap();
		assert_eq!(config.name, "bench");
		assert_eq!(config.tx_throttle_ms, 50);
		assert_eq!(config.io_timeout_ms, DEFAULT_IO_TIMEOUT_MS);
		assert_eq!(config.expected_model.as_deref(), Some(DEFAULT_EXPECTED_MODEL));
		assert_eq!(config.log_target(), "ds1000::bench");
	}

	#[test]
	fn null_model_disables_the_check() {
		let config = Ds1000Config::from_json(r#"{ "expected_model": null }"#).unwrap();
		assert_eq!(config.expected_model, None);
	}

	#[test]
	fn bad_json_is_rejected() {
		assert!(matches!(Ds1000Config::from_json("{ name: 1 }"), Err(Error::InvalidArgument{ .. })));
	}
}
