
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_IO_TIMEOUT_MS:u32 = 2000;
pub const DEFAULT_LOCK_TIMEOUT_MS:u32 = 10000;
pub const DEFAULT_DEVICE_NAME:&str = "inst0";

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a device_read reply
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping};
use crate::rpc::tcp_clients::TcpClient;

pub mod xdr_pack;

fn device_err(operation:&'static str, code:i32) -> Error {
    let message = match code {
        1  => "Syntax error",
        3  => "Device not accessible",
        4  => "Invalid link identifier",
        5  => "Parameter error",
        9  => "Out of resources",
        11 => "Device locked by another link",
        15 => "I/O timeout",
        17 => "I/O error",
        21 => "Invalid address",
        23 => "Abort",
        _  => "Unknown error",
    };
    Error::Device{ operation, code, message }
}

#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub device: String,
    pub io_timeout_ms: u32,
    pub lock_timeout_ms: u32,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE_NAME.to_owned(),
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

pub struct CoreClient {
    client: TcpClient,
    options: LinkOptions,
    opt_link: Option<Link>,
}

#[derive(Debug)]
pub struct Link {
    pub link_id: i32,
    pub abort_port: u32,
    pub max_recv_size: u32,
}

// Leave the socket some slack so the device reports its own timeouts first
fn socket_timeout(options:&LinkOptions) -> Option<Duration> {
    Some(Duration::from_millis(options.io_timeout_ms as u64 + options.lock_timeout_ms as u64))
}

impl CoreClient {

    fn get_link(&self) -> Result<i32> {
        match self.opt_link {
            Some(Link{ link_id, .. }) => Ok(link_id),
            None => Err(Error::Rpc("No link to the device".to_owned())),
        }
    }

    // Looks up the core channel's port and connects to it; call create_link before any I/O
    pub fn new(host:&str, options:LinkOptions) -> Result<Self> {
        let mut pmap_client = TcpPortMapperClient::new(host, socket_timeout(&options))?;
        let port = pmap_client.get_port(&Mapping{ program: DEVICE_CORE_PROG, version: DEVICE_CORE_VERS, port: 0 })?;
        debug!("VXI-11 core channel for {} is on port {}", host, port);

        Self::with_port(host, port, options)
    }

    // Connects to a core channel whose port is already known
    pub fn with_port(host:&str, port:u16, options:LinkOptions) -> Result<Self> {
        let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, socket_timeout(&options))?;
        Ok(CoreClient{ client, options, opt_link: None })
    }

    pub fn link(&self) -> Option<&Link> { self.opt_link.as_ref() }

    pub fn create_link(&mut self) -> Result<()> {
        if self.opt_link.is_some() {
            return Err(Error::Rpc("Already connected to a link".to_owned()));
        }

        self.client.start_call(CREATE_LINK);
        xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, self.options.lock_timeout_ms, &self.options.device);
        self.client.do_call()?;

        let error         = self.client.unpacker.unpack_i32()?;
        let link_id       = self.client.unpacker.unpack_i32()?;
        let abort_port    = self.client.unpacker.unpack_u32()?;
        let max_recv_size = self.client.unpacker.unpack_u32()?;

        if error != 0 {
            return Err(device_err("create_link", error));
        }

        info!("Created VXI-11 link {} to {}", link_id, self.options.device);
        self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });
        Ok(())
    }

    pub fn write(&mut self, data:&[u8]) -> Result<()> {
        let link_id = self.get_link()?;

        self.client.start_call(DEVICE_WRITE);
        xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, self.options.io_timeout_ms,
            self.options.lock_timeout_ms, OPERATION_FLAGS_END_ONLY, data);
        self.client.do_call()?;

        let error = self.client.unpacker.unpack_i32()?;
        let size  = self.client.unpacker.unpack_u32()?;

        if error != 0 {
            return Err(device_err("device_write", error));
        }

        if size as usize != data.len() {
            return Err(Error::Rpc(format!("Device confirmed {} bytes but {} were sent", size, data.len())));
        }

        Ok(())
    }

    // Issues device_read calls until the device flags END and returns everything they carried
    pub fn read(&mut self) -> Result<Vec<u8>> {
        let link_id = self.get_link()?;
        let mut reply:Vec<u8> = vec![];

        loop {
            self.client.start_call(DEVICE_READ);
            xdr_pack::pack_device_read_parms(&mut self.client.packer, link_id, u32::MAX, self.options.io_timeout_ms,
                self.options.lock_timeout_ms, 0, 0);
            self.client.do_call()?;

            let error  = self.client.unpacker.unpack_i32()?;
            let reason = self.client.unpacker.unpack_i32()?;
            let data   = self.client.unpacker.unpack_variable_len_opaque()?;

            if error != 0 {
                return Err(device_err("device_read", error));
            }

            reply.extend_from_slice(&data);

            if reason & REASON_END != 0 {
                return Ok(reply);
            }

            if data.is_empty() {
                return Err(Error::Protocol(format!("device_read returned no data and no END after {} bytes (reason {})", reply.len(), reason)));
            }

            trace!("device_read chunk of {} bytes (reason {}), {} so far", data.len(), reason, reply.len());
        }
    }

    pub fn destroy_link(&mut self) -> Result<()> {
        let link_id = self.get_link()?;

        self.client.start_call(DESTROY_LINK);
        xdr_pack::pack_device_link(&mut self.client.packer, link_id);
        self.client.do_call()?;
        self.opt_link = None;

        match self.client.unpacker.unpack_i32()? {
            0    => Ok(()),
            code => Err(device_err("destroy_link", code)),
        }
    }

}

impl Drop for CoreClient {

    fn drop(&mut self) {
        if self.opt_link.is_some() {
            if let Err(e) = self.destroy_link() {
                warn!("Unable to destroy VXI-11 link: {}", e);
            }
        }
    }

}
