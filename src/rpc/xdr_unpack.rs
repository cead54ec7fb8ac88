
use crate::error::{Error, Result};
use crate::xdr::Unpacker;
use crate::rpc::{REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn rpc_err(msg:&str) -> Error { Error::Rpc(msg.to_owned()) }

pub struct Auth {
	pub flavor: i32,
	pub body: Vec<u8>,
}

pub fn unpack_auth(unpacker:&mut Unpacker) -> Result<Auth> {
	let flavor = unpacker.unpack_enum()?;
	let body   = unpacker.unpack_variable_len_opaque()?;
	Ok(Auth{ flavor, body })
}

// Consumes the reply header and leaves the unpacker positioned at the procedure's results
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> Result<(u32, Auth)> {
	let xid = unpacker.unpack_u32()?;

	if unpacker.unpack_enum()? != REPLY { return Err(rpc_err("Expected REPLY message type")); }

	match unpacker.unpack_enum()? {
		MSG_ACCEPTED => { },
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => {
					let low  = unpacker.unpack_u32()?;
					let high = unpacker.unpack_u32()?;
					Err(Error::Rpc(format!("Message denied, server supports RPC versions {} to {}", low, high)))
				},
				AUTH_ERROR => {
					let stat = unpacker.unpack_u32()?;
					Err(Error::Rpc(format!("Message denied with auth error {}", stat)))
				},
				_ => Err(rpc_err("Message denied for an unknown reason")),
			}
		},
		_ => return Err(rpc_err("Neither MSG_DENIED nor MSG_ACCEPTED in reply header")),
	}

	let verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok((xid, verf)),
		PROG_UNAVAIL  => Err(rpc_err("Program unavailable")),
		PROG_MISMATCH => {
			let low  = unpacker.unpack_u32()?;
			let high = unpacker.unpack_u32()?;
			Err(Error::Rpc(format!("Program mismatch, server supports versions {} to {}", low, high)))
		},
		PROC_UNAVAIL  => Err(rpc_err("Procedure unavailable")),
		GARBAGE_ARGS  => Err(rpc_err("Server could not decode the arguments")),
		_             => Err(rpc_err("Call failed for an unknown reason")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::xdr::Packer;

	fn accepted_header(xid:u32, stat:i32) -> Vec<u8> {
		let mut packer = Packer::new();
		packer.pack_u32(xid);
		packer.pack_enum(REPLY);
		packer.pack_enum(MSG_ACCEPTED);
		packer.pack_enum(0);
		packer.pack_variable_len_opaque(&[]);
		packer.pack_enum(stat);
		packer.as_bytes().to_vec()
	}

	#[test]
	fn accepted_reply_leaves_results_unread() {
		let mut bytes = accepted_header(42, SUCCESS);
		bytes.extend_from_slice(&[0, 0, 0, 7]);

		let mut unpacker = Unpacker::new();
		unpacker.reset(&bytes);
		let (xid, verf) = unpack_replyheader(&mut unpacker).unwrap();
		assert_eq!(xid, 42);
		assert_eq!(verf.flavor, 0);
		assert_eq!(unpacker.unpack_u32().unwrap(), 7);
	}

	#[test]
	fn failed_call_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&accepted_header(1, PROG_UNAVAIL));
		assert!(matches!(unpack_replyheader(&mut unpacker), Err(Error::Rpc(_))));
	}
}
