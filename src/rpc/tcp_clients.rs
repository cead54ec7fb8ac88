
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};
use log::trace;

use crate::error::{Error, Result};
use crate::xdr::{Packer, Unpacker};
use super::{xdr_pack, xdr_unpack};

const LAST_FRAGMENT:u32 = 0x8000_0000;

// Largest reply record accepted; a full long-memory waveform is 1 MiB
pub const MAX_RECORD_LEN:usize = 4 * 1024 * 1024;

// An RPC client over a TCP stream using record marking (RFC 5531 section 11)
pub struct TcpClient {
	stream: TcpStream,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: Packer,
	pub unpacker: Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, timeout:Option<Duration>) -> Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(timeout)?;
		stream.set_write_timeout(timeout)?;
		stream.set_nodelay(true)?;
		Ok(Self{ stream, prog, vers, lastxid: 0, packer: Packer::new(), unpacker: Unpacker::new() })
	}

	// Bumps the xid and packs a call header; arguments get packed after this
	pub fn start_call(&mut self, prc:u32) {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc);
	}

	// Sends whatever is in the packer and leaves the results of the matching reply in the unpacker
	pub fn do_call(&mut self) -> Result<()> {
		let call = self.packer.as_bytes();

		let mut send_bytes:Vec<u8> = Vec::with_capacity(call.len() + 4);
		send_bytes.write_u32::<BigEndian>(call.len() as u32 | LAST_FRAGMENT)?;
		send_bytes.extend_from_slice(call);
		self.stream.write_all(&send_bytes)?;
		trace!("rpc call xid={} ({} bytes)", self.lastxid, call.len());

		loop {
			let reply = self.read_record()?;
			self.unpacker.reset(&reply);

			let (xid, _) = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Stale reply to an earlier call
				trace!("discarding stale reply xid={}", xid);
				continue;
			} else {
				return Err(Error::Rpc(format!("Got reply xid {} ahead of the last call {}", xid, self.lastxid)));
			}
		}
	}

	fn read_record(&mut self) -> Result<Vec<u8>> {
		let mut record:Vec<u8> = vec![];

		loop {
			let marker = self.stream.read_u32::<BigEndian>()?;
			let len = (marker & !LAST_FRAGMENT) as usize;

			let start = record.len();
			if start + len > MAX_RECORD_LEN {
				return Err(Error::Rpc(format!("Reply record of at least {} bytes exceeds the {} byte limit", start + len, MAX_RECORD_LEN)));
			}

			record.resize(start + len, 0);
			self.stream.read_exact(&mut record[start..])?;

			if marker & LAST_FRAGMENT != 0 { return Ok(record); }
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;
	use std::thread;

	use crate::rpc::{REPLY, MSG_ACCEPTED, SUCCESS};

	// Reads one call and answers it with the given record fragments
	fn answer_once(fragments:Vec<(u32, Vec<u8>)>) -> (u16, thread::JoinHandle<()>) {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let handle = thread::spawn(move || {
			let (mut stream, _) = listener.accept().unwrap();
			let marker = stream.read_u32::<BigEndian>().unwrap();
			let mut call = vec![0u8; (marker & !LAST_FRAGMENT) as usize];
			stream.read_exact(&mut call).unwrap();

			for (marker, bytes) in fragments {
				stream.write_u32::<BigEndian>(marker).unwrap();
				stream.write_all(&bytes).unwrap();
			}
		});

		(port, handle)
	}

	fn reply_to_first_call(result:u32) -> Vec<u8> {
		let mut packer = Packer::new();
		packer.pack_u32(1);
		packer.pack_enum(REPLY);
		packer.pack_enum(MSG_ACCEPTED);
		packer.pack_enum(0);
		packer.pack_variable_len_opaque(&[]);
		packer.pack_enum(SUCCESS);
		packer.pack_u32(result);
		packer.as_bytes().to_vec()
	}

	#[test]
	fn fragments_are_joined_into_one_record() {
		let reply = reply_to_first_call(0xdead_beef);
		let (head, tail) = reply.split_at(10);
		let (port, server) = answer_once(vec![
			(head.len() as u32, head.to_vec()),
			(tail.len() as u32 | LAST_FRAGMENT, tail.to_vec()),
		]);

		let mut client = TcpClient::connect(("127.0.0.1", port), 0x0607af, 1, Some(Duration::from_secs(5))).unwrap();
		client.start_call(0);
		client.do_call().unwrap();
		assert_eq!(client.unpacker.unpack_u32().unwrap(), 0xdead_beef);
		assert!(client.unpacker.all_data_consumed());
		server.join().unwrap();
	}

	#[test]
	fn oversized_record_is_refused() {
		let (port, server) = answer_once(vec![(0x7fff_ffff | LAST_FRAGMENT, vec![])]);

		let mut client = TcpClient::connect(("127.0.0.1", port), 0x0607af, 1, Some(Duration::from_secs(5))).unwrap();
		client.start_call(0);
		assert!(matches!(client.do_call(), Err(Error::Rpc(_))));
		server.join().unwrap();
	}
}
