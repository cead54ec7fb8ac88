
pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::time::Duration;

use crate::error::{Error, Result};

use super::IPPROTO_TCP;
use super::xdr_pack;
use super::tcp_clients::TcpClient;

#[derive(Debug)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub port: u32,				// XDR encodes ports as u32
}

pub struct TcpPortMapperClient {
	client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Option<Duration>) -> Result<Self> {
		let client = TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ client })
	}

	// Asks the portmapper which TCP port serves the given program; zero means it isn't registered
	pub fn get_port(&mut self, m:&Mapping) -> Result<u16> {
		self.client.start_call(PMAPPROC_GETPORT);
		xdr_pack::pack_mapping(&mut self.client.packer, m.program, m.version, IPPROTO_TCP, m.port);
		self.client.do_call()?;

		let port = self.client.unpacker.unpack_u32()?;
		if !self.client.unpacker.all_data_consumed() {
			return Err(Error::Rpc("Data unexpectedly left over after unpacking port".to_owned()));
		}

		match port {
			0 => Err(Error::Rpc(format!("Program {:#x} version {} is not registered with the portmapper", m.program, m.version))),
			p if p > u16::MAX as u32 => Err(Error::Rpc(format!("Portmapper returned an invalid port {}", p))),
			p => Ok(p as u16),
		}
	}

}
