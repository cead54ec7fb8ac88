//! Waveform transfer: how many points the next read will hold and how the binary block decodes.

use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::transport::Transport;
use super::Ds1000;
use super::channels::ChannelId;

/// Bytes of block header in front of the samples of a `:WAV:DATA?` reply.
pub const HEADER_LEN:usize = 10;

/// ADC code at the vertical center of the screen.
pub const MIDPOINT:f64 = 125.0;

/// 256 codes over 10 vertical divisions.
pub const CODES_PER_DIVISION:f64 = 256.0 / 10.0;

/// Horizontal divisions across the screen.
pub const HORIZONTAL_DIVISIONS:f64 = 12.0;

pub const SCREEN_POINTS:usize       = 600;
pub const RAW_POINTS:usize          = 16_384;
pub const RAW_POINTS_HALF:usize     = 8_192;
pub const LONG_POINTS:usize         = 524_288;
pub const LONG_POINTS_HALF:usize    = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsMode { Normal, Maximum, Raw }

impl FromStr for PointsMode {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim().to_ascii_uppercase().as_str() {
			"NORM" | "NORMAL"  => Ok(PointsMode::Normal),
			"MAX"  | "MAXIMUM" => Ok(PointsMode::Maximum),
			"RAW"              => Ok(PointsMode::Raw),
			other              => Err(Error::UnhandledState(format!("unrecognized waveform points mode {:?}", other))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryDepth { Long, Normal }

impl MemoryDepth {
	pub fn from_reply(reply:&str) -> Self {
		if reply.trim().eq_ignore_ascii_case("LONG") { MemoryDepth::Long } else { MemoryDepth::Normal }
	}
}

/// Only one of the two inputs on screen, which gives that input both halves of the memory.
pub fn half_channel_from(ch1_displayed:bool, ch2_displayed:bool) -> bool {
	ch1_displayed != ch2_displayed
}

/// Full memory is only read back when the points mode asks for the maximum and acquisition is
/// stopped; in every other case the scope hands over what is on screen.
pub fn reads_full_memory(mode:PointsMode, trigger_status:&str) -> bool {
	mode == PointsMode::Maximum && trigger_status.trim().eq_ignore_ascii_case("STOP")
}

/// Number of samples the next waveform read will return.
pub fn resolve_trace_length(mode:PointsMode, trigger_status:&str, depth:MemoryDepth, half_channel:bool) -> usize {
	let full_memory = reads_full_memory(mode, trigger_status);

	match (full_memory, depth, half_channel) {
		(false, _, _)                      => SCREEN_POINTS,
		(true, MemoryDepth::Long, true)    => LONG_POINTS_HALF,
		(true, MemoryDepth::Long, false)   => LONG_POINTS,
		(true, MemoryDepth::Normal, true)  => RAW_POINTS_HALF,
		(true, MemoryDepth::Normal, false) => RAW_POINTS,
	}
}

/// Drops the block header, refusing replies too short to hold one.
pub fn strip_header(reply:&[u8]) -> Result<&[u8]> {
	if reply.len() < HEADER_LEN {
		return Err(Error::Protocol(format!("waveform reply of {} bytes is shorter than its {} byte header", reply.len(), HEADER_LEN)));
	}
	Ok(&reply[HEADER_LEN..])
}

pub fn decode_voltages(samples:&[u8], volts_per_div:f64) -> Vec<f64> {
	samples.iter()
		.map(|&code| -(code as f64 - MIDPOINT) / CODES_PER_DIVISION * volts_per_div)
		.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "units", content = "samples")]
pub enum Waveform {
	#[serde(rename = "V")]
	Volts(Vec<f64>),
	#[serde(rename = "raw")]
	Raw(Vec<u8>),
}

impl Waveform {
	pub fn len(&self) -> usize {
		match self {
			Waveform::Volts(v) => v.len(),
			Waveform::Raw(v)   => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// The `waveform_data` array of a channel.
#[derive(Debug, Clone, Copy)]
pub struct WaveformParameter {
	pub channel: ChannelId,
	pub raw: bool,
}

impl WaveformParameter {
	pub const NAME: &'static str           = "waveform_data";
	pub const LABEL: &'static str          = "Voltage";
	pub const UNIT: &'static str           = "V";
	pub const SETPOINT_NAME: &'static str  = "Time";
	pub const SETPOINT_LABEL: &'static str = "Time";
	pub const SETPOINT_UNIT: &'static str  = "s";

	pub fn new(channel:ChannelId) -> Self { Self{ channel, raw: false } }

	pub fn raw(channel:ChannelId) -> Self { Self{ channel, raw: true } }

	/// Number of points the next `get` should return.
	pub fn shape<T: Transport>(&self, scope:&mut Ds1000<T>) -> Result<usize> { scope.trace_length() }

	pub fn get<T: Transport>(&self, scope:&mut Ds1000<T>) -> Result<Waveform> {
		let samples = scope.fetch_waveform_raw(self.channel)?;

		if self.raw || !self.channel.is_input() {
			return Ok(Waveform::Raw(samples));
		}

		let volts_per_div = scope.channel(self.channel).vertical_scale()?;
		Ok(Waveform::Volts(decode_voltages(&samples, volts_per_div)))
	}

	/// The waveform together with its time setpoints.
	pub fn get_with_time<T: Transport>(&self, scope:&mut Ds1000<T>) -> Result<(Vec<f64>, Waveform)> {
		let waveform = self.get(scope)?;
		let time = scope.time_axis(waveform.len())?;
		Ok((time, waveform))
	}
}

/// Evenly spaced times across the displayed window, centered on the time base offset.
pub fn time_axis(n:usize, seconds_per_div:f64, offset:f64) -> Vec<f64> {
	let span = seconds_per_div * HORIZONTAL_DIVISIONS;
	let step = if n == 0 { 0.0 } else { span / n as f64 };
	(0..n).map(|i| offset - span / 2.0 + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trace_length_table() {
		use MemoryDepth as M;
		use PointsMode as P;

		let cases = [
			(P::Maximum, "STOP", M::Long,   true,  1_048_576),
			(P::Maximum, "STOP", M::Long,   false,   524_288),
			(P::Maximum, "STOP", M::Normal, true,      8_192),
			(P::Maximum, "STOP", M::Normal, false,    16_384),
			(P::Maximum, "RUN",  M::Normal, false,       600),
			(P::Maximum, "RUN",  M::Long,   true,        600),
			(P::Maximum, "T'D",  M::Long,   false,       600),
			(P::Normal,  "STOP", M::Long,   true,        600),
			(P::Normal,  "RUN",  M::Normal, false,       600),
			(P::Raw,     "STOP", M::Long,   true,        600),
			(P::Raw,     "WAIT", M::Normal, false,       600),
		];

		for (mode, status, depth, half, expected) in cases.iter() {
			assert_eq!(resolve_trace_length(*mode, status, *depth, *half), *expected,
				"{:?} {} {:?} half={}", mode, status, depth, half);
		}
	}

	#[test]
	fn every_combination_gives_a_known_length() {
		let known = [SCREEN_POINTS, RAW_POINTS_HALF, RAW_POINTS, LONG_POINTS, LONG_POINTS_HALF];
		for mode in [PointsMode::Normal, PointsMode::Maximum, PointsMode::Raw].iter() {
			for status in ["RUN", "STOP", "T'D", "WAIT", "AUTO"].iter() {
				for depth in [MemoryDepth::Long, MemoryDepth::Normal].iter() {
					for half in [true, false].iter() {
						assert!(known.contains(&resolve_trace_length(*mode, status, *depth, *half)));
					}
				}
			}
		}
	}

	#[test]
	fn points_mode_spellings() {
		assert_eq!("MAXIMUM".parse::<PointsMode>().unwrap(), PointsMode::Maximum);
		assert_eq!("max\n".parse::<PointsMode>().unwrap(), PointsMode::Maximum);
		assert_eq!("NORMAL".parse::<PointsMode>().unwrap(), PointsMode::Normal);
		assert_eq!("RAW".parse::<PointsMode>().unwrap(), PointsMode::Raw);
		assert!(matches!("FAST".parse::<PointsMode>(), Err(Error::UnhandledState(_))));
	}

	#[test]
	fn half_channel_is_xor() {
		assert!(!half_channel_from(true, true));
		assert!(half_channel_from(true, false));
		assert!(half_channel_from(false, true));
		assert!(!half_channel_from(false, false));
	}

	#[test]
	fn decode_rescales_around_the_midpoint() {
		assert_eq!(decode_voltages(&[125, 125, 125], 1.0), vec![0.0, 0.0, 0.0]);
		assert_eq!(decode_voltages(&[0], 1.0), vec![4.8828125]);
		assert_eq!(decode_voltages(&[255], 2.0), vec![-10.15625]);
		assert!(decode_voltages(&[], 1.0).is_empty());
	}

	#[test]
	fn header_stripping() {
		for len in [10usize, 11, 610].iter() {
			let reply = vec![7u8; *len];
			assert_eq!(strip_header(&reply).unwrap().len(), len - 10);
		}

		let reply = b"#800000003\x01\x02\x03";
		assert_eq!(strip_header(reply).unwrap(), &[1, 2, 3]);

		for len in 0..10 {
			assert!(matches!(strip_header(&vec![0u8; len]), Err(Error::Protocol(_))));
		}
	}

	#[test]
	fn time_axis_spans_the_screen() {
		let t = time_axis(4, 1.0, 0.0);
		assert_eq!(t, vec![-6.0, -3.0, 0.0, 3.0]);
		assert!(time_axis(0, 1.0, 0.0).is_empty());
	}

	#[test]
	fn waveform_serializes_with_units() {
		let json = serde_json::to_string(&Waveform::Volts(vec![0.5])).unwrap();
		assert_eq!(json, r#"{"units":"V","samples":[0.5]}"#);
	}
}
