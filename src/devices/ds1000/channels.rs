use std::fmt;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::transport::Transport;
use super::Ds1000;
use super::parameters::Value;
use super::waveform::{Waveform, WaveformParameter};

/// The four traces the scope can report: the two inputs and the MATH and FFT pseudo-channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
	Channel1,
	Channel2,
	Math,
	Fft,
}

impl ChannelId {
	pub const ALL: [ChannelId; 4] = [ChannelId::Channel1, ChannelId::Channel2, ChannelId::Math, ChannelId::Fft];

	pub fn scpi(self) -> &'static str {
		match self {
			ChannelId::Channel1 => "CHAN1",
			ChannelId::Channel2 => "CHAN2",
			ChannelId::Math     => "MATH",
			ChannelId::Fft      => "FFT",
		}
	}

	/// Name of the channel's sub-object on the instrument.
	pub fn name(self) -> &'static str {
		match self {
			ChannelId::Channel1 => "ch1",
			ChannelId::Channel2 => "ch2",
			ChannelId::Math     => "ch_MATH",
			ChannelId::Fft      => "ch_FFT",
		}
	}

	// Only the two inputs have a calibrated vertical scale
	pub fn is_input(self) -> bool {
		matches!(self, ChannelId::Channel1 | ChannelId::Channel2)
	}

	pub fn from_name(name:&str) -> Result<ChannelId> {
		ChannelId::ALL.iter()
			.copied()
			.find(|c| c.name() == name || c.scpi().eq_ignore_ascii_case(name))
			.ok_or_else(|| Error::InvalidArgument{
				parameter: "channel".to_owned(),
				value: name.to_owned(),
				reason: format!("must be one of {}", ChannelId::ALL.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")),
			})
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.scpi()) }
}

/// Borrowed view of one channel's parameters on an open instrument.
pub struct Channel<'a, T: Transport> {
	scope: &'a mut Ds1000<T>,
	id: ChannelId,
}

impl<'a, T: Transport> Channel<'a, T> {

	pub(super) fn new(scope:&'a mut Ds1000<T>, id:ChannelId) -> Self { Self{ scope, id } }

	pub fn id(&self) -> ChannelId { self.id }

	pub fn get(&mut self, name:&str) -> Result<Value> { self.scope.get_channel(self.id, name) }

	pub fn set<V: Into<Value>>(&mut self, name:&str, value:V) -> Result<()> { self.scope.set_channel(self.id, name, value) }

	pub fn coupling(&mut self) -> Result<String> { self.scope.channel_str(self.id, "coupling") }
	pub fn set_coupling(&mut self, coupling:&str) -> Result<()> { self.set("coupling", coupling) }

	pub fn vertical_scale(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "vertical_scale") }
	pub fn set_vertical_scale(&mut self, volts_per_div:f64) -> Result<()> { self.set("vertical_scale", volts_per_div) }

	pub fn vertical_offset(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "vertical_offset") }
	pub fn set_vertical_offset(&mut self, volts:f64) -> Result<()> { self.set("vertical_offset", volts) }

	pub fn display(&mut self) -> Result<bool> { self.scope.channel_display(self.id) }
	pub fn set_display(&mut self, enabled:bool) -> Result<()> { self.set("display", enabled) }

	// Measurements
	pub fn amplitude(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "amplitude") }
	pub fn vpp(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "VPP") }
	pub fn maximum(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "maximum") }
	pub fn minimum(&mut self) -> Result<f64> { self.scope.channel_f64(self.id, "minimum") }

	pub fn memory_depth(&mut self) -> Result<i64> {
		let value = self.get("memory_depth")?;
		value.as_i64().ok_or_else(|| Error::Protocol(format!("memory_depth is not an integer: {}", value)))
	}

	pub fn waveform_data(&mut self) -> Result<Waveform> {
		WaveformParameter::new(self.id).get(self.scope)
	}

	pub fn waveform_raw(&mut self) -> Result<Vec<u8>> {
		self.scope.fetch_waveform_raw(self.id)
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn channels_are_found_by_name_or_scpi_identifier() {
		assert_eq!(ChannelId::from_name("ch2").unwrap(), ChannelId::Channel2);
		assert_eq!(ChannelId::from_name("ch_MATH").unwrap(), ChannelId::Math);
		assert_eq!(ChannelId::from_name("fft").unwrap(), ChannelId::Fft);
		assert_eq!(ChannelId::from_name("CHAN1").unwrap(), ChannelId::Channel1);
	}

	#[test]
	fn unknown_channel_lists_the_valid_ones() {
		match ChannelId::from_name("ch3") {
			Err(Error::InvalidArgument{ parameter, value, reason }) => {
				assert_eq!(parameter, "channel");
				assert_eq!(value, "ch3");
				assert_eq!(reason, "must be one of ch1, ch2, ch_MATH, ch_FFT");
			},
			other => panic!("expected a rejection, got {:?}", other),
		}
	}
}
