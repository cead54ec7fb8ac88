use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("VXI-11 device error {code} during {operation}: {message}")]
    Device { operation: &'static str, code: i32, message: &'static str },

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Malformed reply: {0}")]
    Protocol(String),

    #[error("Unable to parse reply {reply:?} to {command:?}")]
    Parse { command: String, reply: String },

    #[error("Invalid value {value:?} for {parameter}: {reason}")]
    InvalidArgument { parameter: String, value: String, reason: String },

    #[error("Parameter {0} is read-only")]
    ReadOnly(String),

    #[error("No parameter named {0}")]
    UnknownParameter(String),

    #[error("Unhandled instrument state: {0}")]
    UnhandledState(String),

    #[error("Connected to a device but it doesn't appear to be the right model: {0}")]
    WrongModel(String),

    #[error("Unable to format command template: {0}")]
    Format(String),
}

impl From<strfmt::FmtError> for Error {
    fn from(e: strfmt::FmtError) -> Self { Error::Format(e.to_string()) }
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self { Error::Serial(e.to_string()) }
}
