//! Rigol DS1000-series oscilloscopes.
//!
//! Every setting is a named parameter backed by a SCPI query and, where writable, a command.
//! Nothing is cached: each read is a round trip to the scope and each write is sent without
//! reading it back. Writes to constrained parameters are checked first and never reach the
//! scope if they fail.

use std::collections::BTreeMap;
use std::str;
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{info, trace, warn};
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::vxi11::CoreClient;

pub mod channels;
pub mod config;
pub mod parameters;
pub mod waveform;

pub use channels::{Channel, ChannelId};
pub use config::Ds1000Config;
pub use parameters::{ParameterDef, Value};
pub use waveform::{MemoryDepth, PointsMode, Waveform, WaveformParameter};

use parameters::{channel_parameter, instrument_parameter, render, CHANNEL_PARAMETERS, INSTRUMENT_PARAMETERS};

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

impl Identity {
	pub fn parse(idn:&str) -> Result<Self> {
		let caps = IDN_RE.captures(idn)
			.ok_or_else(|| Error::Protocol(format!("Unable to parse *IDN? reply {:?}", idn)))?;
		let field = |i:usize| caps.get(i).map(|m| m.as_str().trim().to_owned()).unwrap_or_default();

		Ok(Identity{ manufacturer: field(1), model: field(2), serial_num: field(3), fw_version: field(4) })
	}
}

/// One parameter as captured by [`Ds1000::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
	pub label: &'static str,
	#[serde(skip_serializing_if = "no_unit")]
	pub unit: &'static str,
	pub value: Option<Value>,
}

fn no_unit(unit:&&'static str) -> bool { unit.is_empty() }

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
	pub identity: Option<Identity>,
	pub parameters: BTreeMap<String, ParameterSnapshot>,
	pub channels: BTreeMap<String, BTreeMap<String, ParameterSnapshot>>,
}

pub struct Ds1000<T: Transport> {
	transport: T,
	config: Ds1000Config,
	log_target: String,
	tx_throttle: Duration,
	identity: Option<Identity>,
}

impl Ds1000<CoreClient> {

	/// Opens a VXI-11 link to the scope at `host`.
	pub fn connect(host:&str, config:Ds1000Config) -> Result<Self> {
		let mut core = CoreClient::new(host, config.link_options())?;
		core.create_link()?;
		Ds1000::new(core, config)
	}

}

#[cfg(feature = "serial")]
impl Ds1000<crate::transport::serial::SerialTransport> {

	pub fn open_serial(path:&str, baud_rate:u32, config:Ds1000Config) -> Result<Self> {
		let timeout = Duration::from_millis(config.io_timeout_ms as u64);
		let port = crate::transport::serial::SerialTransport::open(path, baud_rate, timeout)?;
		Ds1000::new(port, config)
	}

}

impl<T: Transport> Ds1000<T> {

	/// Takes ownership of an open transport and checks that a DS1000 answers on it.
	pub fn new(transport:T, config:Ds1000Config) -> Result<Self> {
		let log_target = config.log_target();
		let tx_throttle = Duration::from_millis(config.tx_throttle_ms);

		let mut scope = Self{ transport, config, log_target, tx_throttle, identity: None };
		scope.connect_message()?;
		Ok(scope)
	}

	fn connect_message(&mut self) -> Result<()> {
		let identity = Identity::parse(&self.ask("*IDN?")?)?;

		if let Some(expected) = &self.config.expected_model {
			if !identity.model.contains(expected.as_str()) {
				return Err(Error::WrongModel(identity.model));
			}
		}

		info!(target: self.log_target.as_str(), "Connected to: {} {} (serial:{}, firmware:{})",
			identity.manufacturer, identity.model, identity.serial_num, identity.fw_version);
		self.identity = Some(identity);
		Ok(())
	}

	pub fn identity(&self) -> Option<&Identity> { self.identity.as_ref() }

	pub fn config(&self) -> &Ds1000Config { &self.config }

	pub fn transport(&self) -> &T { &self.transport }

	pub fn into_transport(self) -> T { self.transport }

	// Raw access

	pub fn write(&mut self, cmd:&str) -> Result<()> {
		if !self.tx_throttle.is_zero() { thread::sleep(self.tx_throttle); }
		trace!(target: self.log_target.as_str(), "write {}", cmd);
		self.transport.write(cmd.as_bytes())
	}

	/// Sends a query and returns the reply bytes untouched.
	pub fn ask_raw(&mut self, cmd:&str) -> Result<Vec<u8>> {
		self.write(cmd)?;
		let reply = self.transport.read_raw()?;
		trace!(target: self.log_target.as_str(), "read {} bytes", reply.len());
		Ok(reply)
	}

	/// Sends a query and returns the reply as trimmed text.
	pub fn ask(&mut self, cmd:&str) -> Result<String> {
		let reply = self.ask_raw(cmd)?;
		str::from_utf8(&reply)
			.map(|s| s.trim().to_owned())
			.map_err(|_| Error::Protocol(format!("Reply to {} is not UTF-8", cmd)))
	}

	// Parameter access

	fn render_cmd(&mut self, template:&str, chan:Option<ChannelId>, value:Option<&str>) -> Result<String> {
		let mode = if template.contains("{mode}") { Some(self.trigger_mode()?) } else { None };

		let mut vars:Vec<(&str, &str)> = vec![];
		if let Some(c) = chan { vars.push(("chan", c.scpi())); }
		if let Some(m) = &mode { vars.push(("mode", m.as_str())); }
		if let Some(v) = value { vars.push(("value", v)); }

		render(template, &vars)
	}

	fn read_param(&mut self, def:&ParameterDef, chan:Option<ChannelId>) -> Result<Value> {
		let cmd = self.render_cmd(def.get_cmd, chan, None)?;
		let reply = self.ask(&cmd)?;
		def.decode(&cmd, &reply)
	}

	fn write_param(&mut self, def:&ParameterDef, chan:Option<ChannelId>, value:Value) -> Result<()> {
		let template = def.set_cmd.ok_or_else(|| Error::ReadOnly(def.name.to_owned()))?;

		let encoded = match def.encode(&value) {
			Ok(s) => s,
			Err(e) => {
				warn!(target: self.log_target.as_str(), "Not sending {}: {}", def.name, e);
				return Err(e);
			},
		};

		let cmd = self.render_cmd(template, chan, Some(&encoded))?;
		self.write(&cmd)?;

		if def.post_delay_ms > 0 {
			thread::sleep(Duration::from_millis(def.post_delay_ms));
		}
		Ok(())
	}

	pub fn get(&mut self, name:&str) -> Result<Value> {
		let def = instrument_parameter(name)?;
		self.read_param(def, None)
	}

	pub fn set<V: Into<Value>>(&mut self, name:&str, value:V) -> Result<()> {
		let def = instrument_parameter(name)?;
		self.write_param(def, None, value.into())
	}

	pub fn get_channel(&mut self, chan:ChannelId, name:&str) -> Result<Value> {
		let def = channel_parameter(chan, name)?;
		self.read_param(def, Some(chan))
	}

	pub fn set_channel<V: Into<Value>>(&mut self, chan:ChannelId, name:&str, value:V) -> Result<()> {
		let def = channel_parameter(chan, name)?;
		self.write_param(def, Some(chan), value.into())
	}

	fn get_string(&mut self, name:&str) -> Result<String> {
		Ok(match self.get(name)? {
			Value::Str(s) => s,
			other         => other.to_string(),
		})
	}

	fn get_f64(&mut self, name:&str) -> Result<f64> {
		let value = self.get(name)?;
		value.as_f64().ok_or_else(|| Error::Protocol(format!("{} is not numeric: {}", name, value)))
	}

	pub(crate) fn channel_f64(&mut self, chan:ChannelId, name:&str) -> Result<f64> {
		let value = self.get_channel(chan, name)?;
		value.as_f64().ok_or_else(|| Error::Protocol(format!("{}.{} is not numeric: {}", chan.name(), name, value)))
	}

	pub(crate) fn channel_str(&mut self, chan:ChannelId, name:&str) -> Result<String> {
		Ok(match self.get_channel(chan, name)? {
			Value::Str(s) => s,
			other         => other.to_string(),
		})
	}

	pub(crate) fn channel_display(&mut self, chan:ChannelId) -> Result<bool> {
		let value = self.get_channel(chan, "display")?;
		value.as_bool().ok_or_else(|| Error::Protocol(format!("{}.display is not a boolean: {}", chan.name(), value)))
	}

	// Channels

	pub fn channels(&self) -> &'static [ChannelId] { &ChannelId::ALL }

	pub fn channel(&mut self, id:ChannelId) -> Channel<'_, T> { Channel::new(self, id) }

	pub fn channel_by_name(&mut self, name:&str) -> Result<Channel<'_, T>> {
		let id = ChannelId::from_name(name)?;
		Ok(Channel::new(self, id))
	}

	// Typed accessors for the settings the driver itself depends on

	pub fn trigger_mode(&mut self) -> Result<String> { self.get_string("trigger_mode") }

	pub fn trigger_status(&mut self) -> Result<String> { self.get_string("trigger_status") }

	pub fn waveform_points_mode(&mut self) -> Result<PointsMode> { self.get_string("waveform_points_mode")?.parse() }

	pub fn acquire_mem_depth(&mut self) -> Result<MemoryDepth> {
		Ok(MemoryDepth::from_reply(&self.get_string("acquire_mem_depth")?))
	}

	pub fn time_base_scale(&mut self) -> Result<f64> { self.get_f64("time_base_scale") }

	pub fn time_base_offset(&mut self) -> Result<f64> { self.get_f64("time_base_offset") }

	// Waveforms

	/// True when exactly one of the two inputs is displayed.
	pub fn half_channel(&mut self) -> Result<bool> {
		let ch1 = self.channel_display(ChannelId::Channel1)?;
		let ch2 = self.channel_display(ChannelId::Channel2)?;
		Ok(waveform::half_channel_from(ch1, ch2))
	}

	/// Number of samples the next waveform read will return, from the live settings.
	pub fn trace_length(&mut self) -> Result<usize> {
		let mode = self.waveform_points_mode()?;
		if mode != PointsMode::Maximum {
			trace!(target: self.log_target.as_str(), "trace length {} ({:?})", waveform::SCREEN_POINTS, mode);
			return Ok(waveform::SCREEN_POINTS);
		}

		let status = self.trigger_status()?;
		if !waveform::reads_full_memory(mode, &status) {
			trace!(target: self.log_target.as_str(), "trace length {} ({:?}, {})", waveform::SCREEN_POINTS, mode, status);
			return Ok(waveform::SCREEN_POINTS);
		}

		let depth = self.acquire_mem_depth()?;
		let half = self.half_channel()?;

		let n = waveform::resolve_trace_length(mode, &status, depth, half);
		trace!(target: self.log_target.as_str(), "trace length {} ({:?}, {}, {:?}, half={})", n, mode, status, depth, half);
		Ok(n)
	}

	/// The sample bytes of a `:WAV:DATA?` reply with the block header removed.
	pub(crate) fn fetch_waveform_raw(&mut self, chan:ChannelId) -> Result<Vec<u8>> {
		let reply = self.ask_raw(&format!(":WAV:DATA? {}", chan.scpi()))?;
		Ok(waveform::strip_header(&reply)?.to_vec())
	}

	pub fn waveform(&mut self, chan:ChannelId) -> Result<Waveform> {
		WaveformParameter::new(chan).get(self)
	}

	pub fn time_axis(&mut self, n:usize) -> Result<Vec<f64>> {
		let scale = self.time_base_scale()?;
		let offset = self.time_base_offset()?;
		Ok(waveform::time_axis(n, scale, offset))
	}

	// Front panel actions

	pub fn run(&mut self)           -> Result<()> { self.write(":RUN") }
	pub fn stop(&mut self)          -> Result<()> { self.write(":STOP") }
	pub fn single(&mut self)        -> Result<()> { self.write(":SINGle") }
	pub fn force_trigger(&mut self) -> Result<()> { self.write(":TFORce") }
	pub fn beep(&mut self)          -> Result<()> { self.write(":BEEP:ACT") }

	// Snapshot

	/// Reads every gettable parameter. A parameter that fails to read is recorded as `None`.
	pub fn snapshot(&mut self) -> Result<Snapshot> {
		let mut parameters = BTreeMap::new();
		for def in INSTRUMENT_PARAMETERS {
			let entry = self.snapshot_value(def, None);
			parameters.insert(def.name.to_owned(), entry);
		}

		let mut channels = BTreeMap::new();
		for chan in ChannelId::ALL.iter().copied() {
			let mut values = BTreeMap::new();
			for name in CHANNEL_PARAMETERS.iter().map(|p| p.name) {
				let def = channel_parameter(chan, name)?;
				values.insert(name.to_owned(), self.snapshot_value(def, Some(chan)));
			}
			channels.insert(chan.name().to_owned(), values);
		}

		Ok(Snapshot{ identity: self.identity.clone(), parameters, channels })
	}

	fn snapshot_value(&mut self, def:&'static ParameterDef, chan:Option<ChannelId>) -> ParameterSnapshot {
		let value = match self.read_param(def, chan) {
			Ok(v) => Some(v),
			Err(e) => {
				warn!(target: self.log_target.as_str(), "Snapshot of {}{} failed: {}",
					chan.map(|c| format!("{}.", c.name())).unwrap_or_default(), def.name, e);
				None
			},
		};

		ParameterSnapshot{ label: def.label, unit: def.unit, value }
	}

}
