use std::fs;

use clap::Parser;
use log::info;

use ds1000::{ChannelId, Ds1000, Ds1000Config};
use ds1000::devices::ds1000::WaveformParameter;

#[derive(Parser)]
#[command(name = "ds1000_capture")]
#[command(about = "Dump the settings of a Rigol DS1000 and capture one waveform")]
struct Args {
	/// Hostname or IP address of the scope
	host: String,

	/// Channel to capture (ch1, ch2, ch_MATH, ch_FFT)
	#[arg(short, long, default_value = "ch1")]
	channel: String,

	/// Return the sample codes without scaling them to volts
	#[arg(short, long)]
	raw: bool,

	/// Stop acquisition before reading, so MAXIMUM points mode reads the whole memory
	#[arg(short, long)]
	stop: bool,

	/// JSON file with driver configuration
	#[arg(long)]
	config: Option<String>,

	/// Show debug information
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if args.verbose {
		env_logger::Builder::from_default_env()
			.filter_level(log::LevelFilter::Debug)
			.init();
	} else {
		env_logger::init();
	}

	let config = match &args.config {
		Some(path) => Ds1000Config::from_json(&fs::read_to_string(path)?)?,
		None       => Ds1000Config::default(),
	};

	let channel = ChannelId::from_name(&args.channel)?;
	let mut scope = Ds1000::connect(&args.host, config)?;

	if args.stop { scope.stop()?; }

	let snapshot = scope.snapshot()?;
	println!("{}", serde_json::to_string_pretty(&snapshot)?);

	let param = if args.raw { WaveformParameter::raw(channel) } else { WaveformParameter::new(channel) };
	info!("Expecting {} points from {}", param.shape(&mut scope)?, channel);

	let (time, waveform) = param.get_with_time(&mut scope)?;
	info!("Read {} points from {}", waveform.len(), channel);

	println!("{}", serde_json::to_string(&serde_json::json!({
		"channel": channel.name(),
		"time": time,
		"waveform": waveform,
	}))?);

	Ok(())
}
