//! TCP bus bridge client.
//!
//! Every access is one request/response exchange:
//!
//! ```text
//! request : [op: u8][address: u32 LE][value: u32 LE]     (9 bytes)
//! response: [status: u8][value: u32 LE]                  (5 bytes)
//! ```
//!
//! `op` is 0 = read, 1 = write, 2 = poll, 3 = wait. A status of 1 reports a
//! bus fault and carries the faulting address in `value`.

use super::DevBus;
use crate::error::BusError;
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BridgeOp {
    Read = 0,
    Write = 1,
    Poll = 2,
    Wait = 3,
}

impl BridgeOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(BridgeOp::Read),
            1 => Some(BridgeOp::Write),
            2 => Some(BridgeOp::Poll),
            3 => Some(BridgeOp::Wait),
            _ => None,
        }
    }
}

pub const STATUS_OK: u8 = 0;
pub const STATUS_FAULT: u8 = 1;

pub const REQUEST_LEN: usize = 9;
pub const RESPONSE_LEN: usize = 5;

pub fn encode_request(op: BridgeOp, address: u32, value: u32) -> [u8; REQUEST_LEN] {
    let mut frame = [0u8; REQUEST_LEN];
    frame[0] = op as u8;
    frame[1..5].copy_from_slice(&address.to_le_bytes());
    frame[5..9].copy_from_slice(&value.to_le_bytes());
    frame
}

pub fn encode_response(status: u8, value: u32) -> [u8; RESPONSE_LEN] {
    let mut frame = [0u8; RESPONSE_LEN];
    frame[0] = status;
    frame[1..5].copy_from_slice(&value.to_le_bytes());
    frame
}

/// Bus connection to a remote bridge.
#[derive(Debug)]
pub struct TcpBus {
    stream: Option<TcpStream>,
    timeout: Option<Duration>,
    fault: bool,
}

impl TcpBus {
    /// Connect to a bridge. Failure here means there is no bus at all.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, BusError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!("connected to bus bridge at {}", stream.peer_addr()?);
        Ok(Self {
            stream: Some(stream),
            timeout: None,
            fault: false,
        })
    }

    /// Limit how long a single exchange may take; `None` waits forever.
    ///
    /// An exchange that runs out of time fails with [`BusError::Timeout`] and
    /// drops the connection.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), BusError> {
        let stream = self.stream.as_ref().ok_or(BusError::Closed)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn exchange(&mut self, op: BridgeOp, address: u32, value: u32) -> io::Result<[u8; RESPONSE_LEN]> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        stream.write_all(&encode_request(op, address, value))?;

        let mut response = [0u8; RESPONSE_LEN];
        stream.read_exact(&mut response)?;
        Ok(response)
    }

    fn transact(&mut self, op: BridgeOp, address: u32, value: u32) -> Result<u32, BusError> {
        if self.stream.is_none() {
            return Err(BusError::Closed);
        }
        let response = match self.exchange(op, address, value) {
            Ok(response) => response,
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                let waited_ms = self.timeout.map_or(0, |t| t.as_millis() as u64);
                warn!("bus bridge silent for {waited_ms} ms on {op:?} at 0x{address:08x}, dropping connection");
                self.kill();
                return Err(BusError::Timeout { address, waited_ms });
            }
            Err(err) => return Err(err.into()),
        };
        let payload = u32::from_le_bytes([response[1], response[2], response[3], response[4]]);

        match response[0] {
            STATUS_OK => Ok(payload),
            STATUS_FAULT => {
                self.fault = true;
                Err(BusError::Fault { address: payload })
            }
            other => Err(BusError::Protocol(format!(
                "unknown response status {other} for {op:?} at 0x{address:08x}"
            ))),
        }
    }
}

impl DevBus for TcpBus {
    fn write_io(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        self.transact(BridgeOp::Write, address, value).map(|_| ())
    }

    fn read_io(&mut self, address: u32) -> Result<u32, BusError> {
        self.transact(BridgeOp::Read, address, 0)
    }

    fn poll(&mut self) -> Result<bool, BusError> {
        self.transact(BridgeOp::Poll, 0, 0).map(|pending| pending != 0)
    }

    fn wait(&mut self) -> Result<(), BusError> {
        self.transact(BridgeOp::Wait, 0, 0).map(|_| ())
    }

    fn has_fault(&self) -> bool {
        self.fault
    }

    fn clear_fault(&mut self) {
        self.fault = false;
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.flush().and_then(|_| stream.shutdown(Shutdown::Write)) {
                warn!("closing bus bridge connection: {err}");
            }
        }
    }

    fn kill(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpBus {
    fn drop(&mut self) {
        self.close();
    }
}
