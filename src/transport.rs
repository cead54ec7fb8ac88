//! The seam between a driver and the wire.
//!
//! A driver only ever writes a command and reads back one complete reply, so anything that can do
//! those two things (a VXI-11 link, a serial port, a scripted stand-in for tests) can carry it.

use std::io::{ErrorKind, Read};
use std::str;

use crate::error::{Error, Result};
use crate::vxi11::CoreClient;

pub trait Transport {
    /// Sends one complete command or query.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Reads one complete reply, binary blocks included.
    fn read_raw(&mut self) -> Result<Vec<u8>>;

    fn ask(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.write(data)?;
        self.read_raw()
    }
}

impl Transport for CoreClient {
    fn write(&mut self, data: &[u8]) -> Result<()> { CoreClient::write(self, data) }
    fn read_raw(&mut self) -> Result<Vec<u8>> { CoreClient::read(self) }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> { (**self).write(data) }
    fn read_raw(&mut self) -> Result<Vec<u8>> { (**self).read_raw() }
}

/// Reads one reply from a byte stream: either a line of text ending in `\n`, or an IEEE 488.2
/// definite-length block (`#<n><n digits><payload>`) whose payload may itself contain newlines.
///
/// A block may be followed by a terminator. It is consumed when present; a read that times out
/// waiting for it is not an error.
pub fn read_reply<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let first = read_byte(reader)?;
    let mut reply = vec![first];

    if first == b'#' {
        let n_digits = read_byte(reader)?;
        reply.push(n_digits);

        let n_digits = (n_digits as char)
            .to_digit(10)
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::Protocol(format!("Bad block header digit count {:?}", n_digits as char)))?;

        let mut digits = vec![0u8; n_digits as usize];
        reader.read_exact(&mut digits)?;
        let len: usize = str::from_utf8(&digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Protocol(format!("Bad block header length {:?}", String::from_utf8_lossy(&digits))))?;
        reply.extend_from_slice(&digits);

        let start = reply.len();
        reply.resize(start + len, 0);
        reader.read_exact(&mut reply[start..])?;

        let mut term = [0u8; 1];
        match reader.read(&mut term) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::TimedOut => {},
            Err(e) => return Err(e.into()),
        }
        return Ok(reply);
    }

    while reply[reply.len() - 1] != b'\n' {
        reply.push(read_byte(reader)?);
    }
    Ok(reply)
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    reader.read_exact(&mut b)?;
    Ok(b[0])
}

#[cfg(feature = "serial")]
pub mod serial {
    use std::io::Write;
    use std::time::Duration;

    use log::debug;
    use serialport::SerialPort;

    use super::{read_reply, Transport};
    use crate::error::Result;

    pub const DEFAULT_BAUD_RATE: u32 = 9600;

    /// SCPI over RS-232. Commands are newline terminated; replies are framed by [`read_reply`].
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
            let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
            debug!("Opened {} at {} baud", path, baud_rate);
            Ok(Self { port })
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            self.port.write_all(b"\n")?;
            self.port.flush()?;
            Ok(())
        }

        fn read_raw(&mut self) -> Result<Vec<u8>> { read_reply(&mut self.port) }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, ErrorKind, Read};

    use super::read_reply;
    use crate::error::Error;

    #[test]
    fn text_reply_ends_at_newline() {
        let mut port = Cursor::new(b"1.000e-03\nRUN\n".to_vec());
        assert_eq!(read_reply(&mut port).unwrap(), b"1.000e-03\n".to_vec());
        assert_eq!(read_reply(&mut port).unwrap(), b"RUN\n".to_vec());
    }

    #[test]
    fn block_payload_may_contain_newlines() {
        let mut port = Cursor::new(b"#800000005ab\ncd\nSTOP\n".to_vec());
        assert_eq!(read_reply(&mut port).unwrap(), b"#800000005ab\ncd".to_vec());
        assert_eq!(read_reply(&mut port).unwrap(), b"STOP\n".to_vec());
    }

    #[test]
    fn block_without_terminator() {
        let mut port = Cursor::new(b"#13xyz".to_vec());
        assert_eq!(read_reply(&mut port).unwrap(), b"#13xyz".to_vec());
    }

    #[test]
    fn bad_block_headers() {
        for bad in [&b"#x12"[..], &b"#0\n"[..], &b"#2a9xx"[..]].iter() {
            assert!(matches!(read_reply(&mut Cursor::new(bad.to_vec())), Err(Error::Protocol(_))), "{:?}", bad);
        }
    }

    #[test]
    fn truncated_block_is_an_io_error() {
        let mut port = Cursor::new(b"#800000010abc".to_vec());
        assert!(matches!(read_reply(&mut port), Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof));
    }

    // Hands out its bytes, then fails every further read with `kind`
    struct FailsAfter { data: Cursor<Vec<u8>>, kind: ErrorKind }

    impl Read for FailsAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(self.kind, "port")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn missing_terminator_timeout_is_tolerated() {
        let mut port = FailsAfter{ data: Cursor::new(b"#12hi".to_vec()), kind: ErrorKind::TimedOut };
        assert_eq!(read_reply(&mut port).unwrap(), b"#12hi".to_vec());
    }

    #[test]
    fn disconnect_after_block_is_reported() {
        let mut port = FailsAfter{ data: Cursor::new(b"#12hi".to_vec()), kind: ErrorKind::BrokenPipe };
        assert!(matches!(read_reply(&mut port), Err(Error::Io(e)) if e.kind() == ErrorKind::BrokenPipe));
    }
}
