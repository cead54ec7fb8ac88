
use crate::xdr::Packer;
use crate::rpc::{CALL, RPCVERSION};

pub const AUTH_NONE:i32 = 0;

pub fn pack_auth(packer:&mut Packer, flavor:i32, body:&[u8]) {
	packer.pack_enum(flavor);
	packer.pack_variable_len_opaque(body);
}

pub fn pack_callheader_no_auth(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32) {
	packer.pack_u32(xid);
	packer.pack_enum(CALL);
	packer.pack_u32(RPCVERSION);
	packer.pack_u32(prog);
	packer.pack_u32(vers);
	packer.pack_u32(prc);
	pack_auth(packer, AUTH_NONE, &[]);	// credentials
	pack_auth(packer, AUTH_NONE, &[]);	// verifier
}

pub fn pack_mapping(packer:&mut Packer, prog:u32, vers:u32, prot:u32, port:u32) {
	packer.pack_u32(prog);
	packer.pack_u32(vers);
	packer.pack_u32(prot);
	packer.pack_u32(port);
}
