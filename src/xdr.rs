
// External data representation (RFC 4506). Everything is big-endian and padded to four-byte boundaries.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::error::{Error, Result};

fn short(what:&str) -> Error { Error::Rpc(format!("Buffer too short to unpack {}", what)) }

#[derive(Default)]
pub struct Packer {
	buff: Vec<u8>,
}

impl Packer {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn as_bytes(&self) -> &[u8] { &self.buff }

	pub fn pack_u32(&mut self, x:u32) {
		let mut word = [0u8; 4];
		BigEndian::write_u32(&mut word, x);
		self.buff.extend_from_slice(&word);
	}

	pub fn pack_i32(&mut self, x:i32) { self.pack_u32(x as u32) }

	pub fn pack_bool(&mut self, b:bool) { self.pack_i32(if b { 1 } else { 0 }) }

	pub fn pack_enum(&mut self, x:i32) { self.pack_i32(x) }

	pub fn pack_variable_len_opaque(&mut self, data:&[u8]) {
		self.pack_u32(data.len() as u32);
		self.buff.extend_from_slice(data);

		// Pad with zeros back to alignment
		while self.buff.len() % 4 != 0 { self.buff.push(0); }
	}

}

#[derive(Default)]
pub struct Unpacker {
	buff: Vec<u8>,
	pos: usize,
}

impl Unpacker {

	pub fn new() -> Self { Self::default() }

	pub fn reset(&mut self, data:&[u8]) {
		self.buff.clear();
		self.buff.extend_from_slice(data);
		self.pos = 0;
	}

	pub fn remaining(&self) -> usize { self.buff.len() - self.pos }

	pub fn all_data_consumed(&self) -> bool { self.remaining() == 0 }

	pub fn unpack_u32(&mut self) -> Result<u32> {
		let mut rdr = Cursor::new(&self.buff[self.pos..]);
		let ans = rdr.read_u32::<BigEndian>().map_err(|_| short("u32"))?;
		self.pos += 4;
		Ok(ans)
	}

	pub fn unpack_i32(&mut self) -> Result<i32> {
		let mut rdr = Cursor::new(&self.buff[self.pos..]);
		let ans = rdr.read_i32::<BigEndian>().map_err(|_| short("i32"))?;
		self.pos += 4;
		Ok(ans)
	}

	// The set of legal values depends on the caller, so an enum is unpacked like any other i32
	pub fn unpack_enum(&mut self) -> Result<i32> { self.unpack_i32() }

	pub fn unpack_bool(&mut self) -> Result<bool> {
		match self.unpack_i32()? {
			0 => Ok(false),
			1 => Ok(true),
			x => Err(Error::Rpc(format!("Expected 0 or 1 for a bool but got {}", x))),
		}
	}

	pub fn unpack_variable_len_opaque(&mut self) -> Result<Vec<u8>> {
		let n = self.unpack_u32()? as usize;
		if n > self.remaining() {
			return Err(short("variable-length opaque"));
		}

		let ans = self.buff[self.pos..self.pos + n].to_vec();
		self.pos += n;

		// Skip the padding, which may be absent at the very end of a reply
		self.pos = ((self.pos + 3) / 4 * 4).min(self.buff.len());
		Ok(ans)
	}

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn opaque_is_padded_to_four_bytes() {
		let mut packer = Packer::new();
		packer.pack_variable_len_opaque(b"inst0");
		assert_eq!(packer.as_bytes(), &[0, 0, 0, 5, b'i', b'n', b's', b't', b'0', 0, 0, 0]);

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.as_bytes());
		assert_eq!(unpacker.unpack_variable_len_opaque().unwrap(), b"inst0".to_vec());
		assert!(unpacker.all_data_consumed());
	}

	#[test]
	fn unpacking_past_the_end_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&[0, 0, 1]);
		assert!(unpacker.unpack_u32().is_err());

		unpacker.reset(&[0, 0, 0, 9, 1, 2]);
		assert!(unpacker.unpack_variable_len_opaque().is_err());
	}

	#[test]
	fn bools_must_be_zero_or_one() {
		let mut packer = Packer::new();
		packer.pack_bool(true);
		packer.pack_i32(7);

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.as_bytes());
		assert!(unpacker.unpack_bool().unwrap());
		assert!(unpacker.unpack_bool().is_err());
	}
}
