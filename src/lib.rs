
pub mod error;

// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// Anything a driver can write commands to and read replies from
pub mod transport;

// Instrument drivers
pub mod devices;

pub use error::{Error, Result};
pub use transport::Transport;
pub use devices::ds1000::{Ds1000, Ds1000Config, ChannelId, Value, Waveform};
