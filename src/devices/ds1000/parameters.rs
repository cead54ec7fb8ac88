//! Declarative bindings between named settings and the DS1000 SCPI command set.
//!
//! Command templates use named placeholders that get filled in with `strfmt` at access time:
//! `{chan}` is the channel's SCPI identifier, `{mode}` is the trigger mode read live from the
//! instrument and `{value}` is the value being written.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use super::channels::ChannelId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
}

impl Value {
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(x) => Some(*x),
			Value::Int(x)   => Some(*x as f64),
			_               => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(x)                       => Some(*x),
			Value::Float(x) if x.fract() == 0.0 => Some(*x as i64),
			_                                   => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_              => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_             => None,
		}
	}
}

// The text that goes on the wire
impl fmt::Display for Value {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Bool(b)  => write!(f, "{}", if *b { 1 } else { 0 }),
			Value::Int(x)   => write!(f, "{}", x),
			Value::Float(x) => write!(f, "{}", x),
			Value::Str(s)   => write!(f, "{}", s),
		}
	}
}

impl From<bool> for Value    { fn from(b:bool) -> Self    { Value::Bool(b) } }
impl From<i32> for Value     { fn from(x:i32) -> Self     { Value::Int(x as i64) } }
impl From<i64> for Value     { fn from(x:i64) -> Self     { Value::Int(x) } }
impl From<f64> for Value     { fn from(x:f64) -> Self     { Value::Float(x) } }
impl From<&str> for Value    { fn from(s:&str) -> Self    { Value::Str(s.to_owned()) } }
impl From<String> for Value  { fn from(s:String) -> Self  { Value::Str(s) } }

/// How a textual reply is coerced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parser { Str, Int, Float }

impl Parser {
	pub fn parse(self, command:&str, reply:&str) -> Result<Value> {
		let parse_err = || Error::Parse{ command: command.to_owned(), reply: reply.to_owned() };

		match self {
			Parser::Str   => Ok(Value::Str(reply.to_owned())),
			Parser::Float => reply.parse::<f64>().map(Value::Float).map_err(|_| parse_err()),
			Parser::Int   => {
				// Some firmware reports integers in scientific notation
				if let Ok(x) = reply.parse::<i64>() { return Ok(Value::Int(x)); }
				match reply.parse::<f64>() {
					Ok(x) if x.fract() == 0.0 => Ok(Value::Int(x as i64)),
					_                         => Err(parse_err()),
				}
			},
		}
	}
}

/// Checked before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validator {
	Enum(&'static [&'static str]),
	Ints{ min:i64, max:i64 },
}

impl Validator {
	pub fn check(&self, parameter:&str, value:&Value) -> Result<()> {
		let reject = |reason:String| Error::InvalidArgument{
			parameter: parameter.to_owned(),
			value: value.to_string(),
			reason,
		};

		match self {
			Validator::Enum(allowed) => {
				let text = value.to_string();
				if allowed.iter().any(|a| *a == text) { Ok(()) }
				else { Err(reject(format!("must be one of {:?}", allowed))) }
			},
			Validator::Ints{ min, max } => match value.as_i64() {
				Some(x) if x >= *min && x <= *max => Ok(()),
				Some(_) => Err(reject(format!("must be between {} and {} inclusive", min, max))),
				None    => Err(reject("must be an integer".to_owned())),
			},
		}
	}
}

/// Two-element symbolic set standing in for false/true.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoolMap {
	pub off: &'static str,
	pub on: &'static str,
}

impl BoolMap {
	pub fn to_scpi(&self, b:bool) -> &'static str { if b { self.on } else { self.off } }

	pub fn from_reply(&self, reply:&str) -> Option<bool> {
		if reply.eq_ignore_ascii_case(self.on) { Some(true) }
		else if reply.eq_ignore_ascii_case(self.off) { Some(false) }
		else { None }
	}
}

pub const ZERO_ONE: BoolMap = BoolMap{ off: "0", on: "1" };
pub const OFF_ON: BoolMap   = BoolMap{ off: "OFF", on: "ON" };

#[derive(Debug, Clone, Copy)]
pub struct ParameterDef {
	pub name: &'static str,
	pub label: &'static str,
	pub unit: &'static str,
	pub get_cmd: &'static str,
	pub set_cmd: Option<&'static str>,
	pub parser: Parser,
	pub validator: Option<Validator>,
	pub bool_map: Option<BoolMap>,
	pub post_delay_ms: u64,
}

impl ParameterDef {
	const fn new(name:&'static str, label:&'static str, get_cmd:&'static str) -> Self {
		Self{ name, label, unit: "", get_cmd, set_cmd: None, parser: Parser::Str, validator: None, bool_map: None, post_delay_ms: 0 }
	}

	const fn set(self, set_cmd:&'static str) -> Self { Self{ set_cmd: Some(set_cmd), ..self } }
	const fn float(self) -> Self { Self{ parser: Parser::Float, ..self } }
	const fn int(self) -> Self { Self{ parser: Parser::Int, ..self } }
	const fn unit(self, unit:&'static str) -> Self { Self{ unit, ..self } }
	const fn vals(self, v:Validator) -> Self { Self{ validator: Some(v), ..self } }
	const fn one_of(self, allowed:&'static [&'static str]) -> Self { self.vals(Validator::Enum(allowed)) }
	const fn mapping(self, m:BoolMap) -> Self { Self{ bool_map: Some(m), ..self } }
	const fn post_delay_ms(self, ms:u64) -> Self { Self{ post_delay_ms: ms, ..self } }

	pub fn is_settable(&self) -> bool { self.set_cmd.is_some() }

	// Whether the command has to be scoped by the live trigger mode
	pub fn needs_trigger_mode(&self) -> bool {
		self.get_cmd.contains("{mode}") || self.set_cmd.map_or(false, |c| c.contains("{mode}"))
	}

	/// Turns a value into the text for the `{value}` placeholder, after checking it.
	pub fn encode(&self, value:&Value) -> Result<String> {
		if let Some(map) = self.bool_map {
			return match value.as_bool() {
				Some(b) => Ok(map.to_scpi(b).to_owned()),
				None    => Err(Error::InvalidArgument{
					parameter: self.name.to_owned(),
					value: value.to_string(),
					reason: "must be true or false".to_owned(),
				}),
			};
		}

		if let Some(v) = self.validator {
			v.check(self.name, value)?;
		}

		Ok(value.to_string())
	}

	/// Coerces a trimmed textual reply.
	pub fn decode(&self, command:&str, reply:&str) -> Result<Value> {
		match self.bool_map {
			Some(map) => map.from_reply(reply)
				.map(Value::Bool)
				.ok_or_else(|| Error::Parse{ command: command.to_owned(), reply: reply.to_owned() }),
			None => self.parser.parse(command, reply),
		}
	}
}

/// Fills in a command template from the given placeholder values.
pub fn render(template:&str, vars:&[(&str, &str)]) -> Result<String> {
	let ctx:HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
	Ok(strfmt::strfmt(template, &ctx)?)
}

pub const ACQUIRE_TYPES: &[&str]     = &["NORMAL", "AVERAGE", "PEAKDETECT"];
pub const ACQUIRE_MODES: &[&str]     = &["RTIM", "ETIM"];
pub const ACQUIRE_AVERAGES: &[&str]  = &["2", "4", "8", "16", "32", "64", "128", "256"];
pub const MEMORY_DEPTHS: &[&str]     = &["LONG", "NORM"];
pub const DISPLAY_TYPES: &[&str]     = &["VECT", "DOTS"];
pub const DISPLAY_GRIDS: &[&str]     = &["FULL", "HALF", "NONE"];
pub const ON_OFF: &[&str]            = &["ON", "OFF"];
pub const MENU_TIMEOUTS: &[&str]     = &["1", "2", "5", "10", "20", "Infinite"];
pub const TIME_BASE_MODES: &[&str]   = &["MAIN", "DEL"];
pub const TIME_BASE_FORMATS: &[&str] = &["X-Y", "Y-T", "SCANNING"];
pub const TRIGGER_MODES: &[&str]     = &["EDGE", "PULSE", "VIDEO", "SLOPE", "PATTERN", "DURATION", "ALTERNATION"];
pub const TRIGGER_SWEEPS: &[&str]    = &["AUTO", "NORM", "SING"];
pub const TRIGGER_COUPLINGS: &[&str] = &["DC", "AC", "HF", "LF"];
pub const POINTS_MODES: &[&str]      = &["NORM", "MAX", "RAW"];

const BRIGHTNESS: Validator = Validator::Ints{ min: 0, max: 32 };

pub static INSTRUMENT_PARAMETERS: &[ParameterDef] = &[
	// Acquisition
	ParameterDef::new("acquire_type", "Type of acquisition being used by the oscilloscope", ":ACQ:TYPE?")
		.set(":ACQ:TYPE {value}").one_of(ACQUIRE_TYPES),
	ParameterDef::new("acquire_mode", "Mode of acquisition being used by the oscilloscope", ":ACQ:MODE?")
		.set(":ACQ:MODE {value}").one_of(ACQUIRE_MODES),
	ParameterDef::new("acquire_averages", "Number of averages in average mode", ":ACQ:AVER?")
		.set(":ACQ:AVER {value}").int().one_of(ACQUIRE_AVERAGES),
	ParameterDef::new("acquire_mem_depth", "Depth of memory being used by the oscilloscope", ":ACQ:MEMDepth?")
		.set(":ACQ:MEMDepth {value}").one_of(MEMORY_DEPTHS),

	// Display
	ParameterDef::new("display_type", "Display type between samples, either vector or dot", ":DISP:TYPE?")
		.set(":DISP:TYPE {value}").one_of(DISPLAY_TYPES),
	ParameterDef::new("display_grid", "Display grid", ":DISP:GRID?")
		.set(":DISP:GRID {value}").one_of(DISPLAY_GRIDS),
	ParameterDef::new("display_persist", "Whether waveform record points persist or refresh", ":DISP:PERS?")
		.set(":DISP:PERS {value}").one_of(ON_OFF),
	ParameterDef::new("display_mnud", "Time before menus hide automatically", ":DISP:MNUD?")
		.set(":DISP:MNUD {value}").one_of(MENU_TIMEOUTS),
	ParameterDef::new("display_mnus", "Status of the menus", ":DISP:MNUS?")
		.set(":DISP:MNUS {value}").one_of(ON_OFF),
	ParameterDef::new("display_brightness", "Brightness of the grid", ":DISP:BRIG?")
		.set(":DISP:BRIG {value}").int().vals(BRIGHTNESS),
	ParameterDef::new("display_intensity", "Brightness of the waveform", ":DISP:INT?")
		.set(":DISP:INT {value}").int().vals(BRIGHTNESS),

	// Time base
	ParameterDef::new("time_base_mode", "Scan mode of the horizontal time base", ":TIM:MODE?")
		.set(":TIM:MODE {value}").one_of(TIME_BASE_MODES),
	ParameterDef::new("time_base_offset", "Main and delayed mode offset", ":TIM:OFFS?")
		.set(":TIM:OFFS {value}").float().unit("s"),
	ParameterDef::new("time_base_scale", "Scale of the horizontal time base", ":TIM:SCAL?")
		.set(":TIM:SCAL {value}").float().unit("s/div"),
	ParameterDef::new("time_base_format", "Format of the time base", ":TIM:FORM?")
		.set(":TIM:FORM {value}").one_of(TIME_BASE_FORMATS),

	// Trigger
	ParameterDef::new("trigger_mode", "Trigger mode", ":TRIG:MODE?")
		.set(":TRIG:MODE {value}").one_of(TRIGGER_MODES),
	ParameterDef::new("trigger_source", "Trigger source", ":TRIG:{mode}:SOUR?")
		.set(":TRIG:{mode}:SOUR {value}"),
	ParameterDef::new("trigger_level", "Trigger level", ":TRIG:{mode}:LEV?")
		.set(":TRIG:{mode}:LEV {value}").float().unit("V"),
	ParameterDef::new("trigger_sweep", "Trigger sweep", ":TRIG:{mode}:SWE?")
		.set(":TRIG:{mode}:SWE {value}").one_of(TRIGGER_SWEEPS),
	ParameterDef::new("trigger_coupling", "Trigger coupling", ":TRIG:{mode}:COUP?")
		.set(":TRIG:{mode}:COUP {value}").one_of(TRIGGER_COUPLINGS),
	ParameterDef::new("trigger_holdoff", "Trigger holdoff", ":TRIG:HOLD?")
		.set(":TRIG:HOLD {value}").float().unit("s"),
	ParameterDef::new("trigger_status", "Trigger status", ":TRIG:STAT?"),

	// Waveform
	ParameterDef::new("waveform_points_mode", "Number of the waveform points", ":WAVEFORM:POINTS:MODE?")
		.set(":WAVEFORM:POINTS:MODE {value}").one_of(POINTS_MODES),
];

pub static CHANNEL_PARAMETERS: &[ParameterDef] = &[
	ParameterDef::new("coupling", "Input coupling", ":{chan}:COUP?")
		.set(":{chan}:COUP {value}").post_delay_ms(200),
	ParameterDef::new("amplitude", "Amplitude", ":MEAS:VAMP? {chan}")
		.float().unit("V"),
	ParameterDef::new("vertical_scale", "Vertical scale", ":{chan}:SCAL?")
		.set(":{chan}:SCAL {value}").float().unit("V"),
	ParameterDef::new("display", "Display enabled", ":{chan}:DISP?")
		.set(":{chan}:DISP {value}").mapping(ZERO_ONE),
	ParameterDef::new("vertical_offset", "Vertical offset", ":{chan}:OFFS?")
		.set(":{chan}:OFFS {value}").float().unit("V"),
	ParameterDef::new("VPP", "Peak to peak voltage", ":MEAS:VPP? {chan}")
		.float().unit("V"),
	ParameterDef::new("maximum", "Maximum voltage", ":MEAS:VMAX? {chan}")
		.float().unit("V"),
	ParameterDef::new("minimum", "Minimum voltage", ":MEAS:VMIN? {chan}")
		.float().unit("V"),
	ParameterDef::new("memory_depth", "Memory depth", ":{chan}:MEMD?")
		.int(),
];

// The FFT trace reports its display state as OFF/ON instead of 0/1
static FFT_DISPLAY: ParameterDef = ParameterDef::new("display", "Display enabled", ":{chan}:DISP?")
	.set(":{chan}:DISP {value}").mapping(OFF_ON);

pub fn instrument_parameter(name:&str) -> Result<&'static ParameterDef> {
	INSTRUMENT_PARAMETERS.iter()
		.find(|p| p.name == name)
		.ok_or_else(|| Error::UnknownParameter(name.to_owned()))
}

pub fn channel_parameter(channel:ChannelId, name:&str) -> Result<&'static ParameterDef> {
	if channel == ChannelId::Fft && name == FFT_DISPLAY.name {
		return Ok(&FFT_DISPLAY);
	}

	CHANNEL_PARAMETERS.iter()
		.find(|p| p.name == name)
		.ok_or_else(|| Error::UnknownParameter(format!("{}.{}", channel.name(), name)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enum_constraint_accepts_members_and_rejects_the_rest() {
		let def = instrument_parameter("acquire_type").unwrap();
		for allowed in ACQUIRE_TYPES {
			assert_eq!(def.encode(&Value::from(*allowed)).unwrap(), *allowed);
		}

		for bad in &["normal", "AVG", "", "PEAK"] {
			match def.encode(&Value::from(*bad)) {
				Err(Error::InvalidArgument{ parameter, .. }) => assert_eq!(parameter, "acquire_type"),
				other => panic!("expected rejection of {:?}, got {:?}", bad, other),
			}
		}
	}

	#[test]
	fn numeric_enum_matches_integers() {
		let def = instrument_parameter("acquire_averages").unwrap();
		assert_eq!(def.encode(&Value::from(16)).unwrap(), "16");
		assert_eq!(def.encode(&Value::from(256.0)).unwrap(), "256");
		assert!(def.encode(&Value::from(3)).is_err());
		assert!(def.encode(&Value::from(512)).is_err());
	}

	#[test]
	fn integer_range_is_inclusive() {
		let def = instrument_parameter("display_brightness").unwrap();
		assert!(def.encode(&Value::from(0)).is_ok());
		assert!(def.encode(&Value::from(32)).is_ok());
		assert!(def.encode(&Value::from(33)).is_err());
		assert!(def.encode(&Value::from(-1)).is_err());
		assert!(def.encode(&Value::from(1.5)).is_err());
		assert!(def.encode(&Value::from("ten")).is_err());
	}

	#[test]
	fn display_maps_booleans_per_channel() {
		let ch1 = channel_parameter(ChannelId::Channel1, "display").unwrap();
		assert_eq!(ch1.encode(&Value::from(true)).unwrap(), "1");
		assert_eq!(ch1.decode(":CHAN1:DISP?", "0").unwrap(), Value::Bool(false));

		let fft = channel_parameter(ChannelId::Fft, "display").unwrap();
		assert_eq!(fft.encode(&Value::from(false)).unwrap(), "OFF");
		assert_eq!(fft.decode(":FFT:DISP?", "ON").unwrap(), Value::Bool(true));

		assert!(ch1.encode(&Value::from("ON")).is_err());
		assert!(ch1.decode(":CHAN1:DISP?", "maybe").is_err());
	}

	#[test]
	fn replies_are_coerced() {
		assert_eq!(Parser::Float.parse("q", "2.000e-01").unwrap(), Value::Float(0.2));
		assert_eq!(Parser::Int.parse("q", "16").unwrap(), Value::Int(16));
		assert_eq!(Parser::Int.parse("q", "1.6e+04").unwrap(), Value::Int(16000));
		assert_eq!(Parser::Str.parse("q", "EDGE").unwrap(), Value::from("EDGE"));
		assert!(Parser::Float.parse("q", "ERR").is_err());
		assert!(Parser::Int.parse("q", "1.5").is_err());
	}

	#[test]
	fn templates_render_named_placeholders() {
		let def = instrument_parameter("trigger_level").unwrap();
		assert!(def.needs_trigger_mode());
		assert_eq!(render(def.get_cmd, &[("mode", "PULSE")]).unwrap(), ":TRIG:PULSE:LEV?");

		let def = channel_parameter(ChannelId::Channel2, "vertical_scale").unwrap();
		assert!(!def.needs_trigger_mode());
		assert_eq!(render(def.set_cmd.unwrap(), &[("chan", "CHAN2"), ("value", "0.5")]).unwrap(), ":CHAN2:SCAL 0.5");
		assert!(render(def.set_cmd.unwrap(), &[("chan", "CHAN2")]).is_err());
	}

	#[test]
	fn unknown_names_are_reported() {
		assert!(matches!(instrument_parameter("volume"), Err(Error::UnknownParameter(_))));
		assert!(matches!(channel_parameter(ChannelId::Math, "volume"), Err(Error::UnknownParameter(_))));
	}
}
