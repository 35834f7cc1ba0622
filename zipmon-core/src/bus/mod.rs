//! Register Bus
//!
//! [`DevBus`] is the capability the debugger and tools use to talk to a CPU's
//! debug port: single-register reads and writes, block transfers, readiness
//! polling, a sticky fault flag and connection lifecycle.
//!
//! # Transports
//! - [`sim::SimBus`]: an in-process model of the debug port backed by a memory
//!   image, used for offline sessions and tests
//! - [`net::TcpBus`]: a client for a bus bridge reachable over TCP
//!
//! Opening a transport is done by its constructor; a failure there is fatal to
//! the caller. Once open, every access that the device rejects returns
//! [`BusError::Fault`] tagged with the offending address and raises the fault
//! flag until [`DevBus::clear_fault`] is called.

pub mod net;
pub mod sim;

use crate::error::BusError;

/// How a block transfer walks the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Each word goes to the next address (memory).
    Incrementing,
    /// Every word goes to the same address (FIFOs, data ports).
    Fixed,
}

impl AddressMode {
    fn address(self, base: u32, index: usize) -> u32 {
        match self {
            AddressMode::Incrementing => base.wrapping_add(index as u32),
            AddressMode::Fixed => base,
        }
    }
}

/// A connection to a device register bus.
pub trait DevBus {
    /// Write one word.
    fn write_io(&mut self, address: u32, value: u32) -> Result<(), BusError>;

    /// Read one word.
    fn read_io(&mut self, address: u32) -> Result<u32, BusError>;

    /// Read `buf.len()` words starting at `address`.
    fn read_block(
        &mut self,
        address: u32,
        buf: &mut [u32],
        mode: AddressMode,
    ) -> Result<(), BusError> {
        for (index, slot) in buf.iter_mut().enumerate() {
            *slot = self.read_io(mode.address(address, index))?;
        }
        Ok(())
    }

    /// Write all of `buf` starting at `address`.
    fn write_block(&mut self, address: u32, buf: &[u32], mode: AddressMode) -> Result<(), BusError> {
        for (index, value) in buf.iter().enumerate() {
            self.write_io(mode.address(address, index), *value)?;
        }
        Ok(())
    }

    /// Non-blocking check for a pending device notification (interrupt).
    fn poll(&mut self) -> Result<bool, BusError>;

    /// Block until the device signals readiness.
    fn wait(&mut self) -> Result<(), BusError>;

    /// True once an access has faulted and the flag has not been cleared.
    fn has_fault(&self) -> bool;

    fn clear_fault(&mut self);

    /// Release the connection in an orderly way. Calling it twice is a no-op.
    fn close(&mut self);

    /// Drop the connection immediately without an orderly shutdown.
    fn kill(&mut self);
}

impl<B: DevBus + ?Sized> DevBus for Box<B> {
    fn write_io(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        (**self).write_io(address, value)
    }

    fn read_io(&mut self, address: u32) -> Result<u32, BusError> {
        (**self).read_io(address)
    }

    fn read_block(
        &mut self,
        address: u32,
        buf: &mut [u32],
        mode: AddressMode,
    ) -> Result<(), BusError> {
        (**self).read_block(address, buf, mode)
    }

    fn write_block(&mut self, address: u32, buf: &[u32], mode: AddressMode) -> Result<(), BusError> {
        (**self).write_block(address, buf, mode)
    }

    fn poll(&mut self) -> Result<bool, BusError> {
        (**self).poll()
    }

    fn wait(&mut self) -> Result<(), BusError> {
        (**self).wait()
    }

    fn has_fault(&self) -> bool {
        (**self).has_fault()
    }

    fn clear_fault(&mut self) {
        (**self).clear_fault()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn kill(&mut self) {
        (**self).kill()
    }
}

impl<B: DevBus + ?Sized> DevBus for &mut B {
    fn write_io(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        (**self).write_io(address, value)
    }

    fn read_io(&mut self, address: u32) -> Result<u32, BusError> {
        (**self).read_io(address)
    }

    fn read_block(
        &mut self,
        address: u32,
        buf: &mut [u32],
        mode: AddressMode,
    ) -> Result<(), BusError> {
        (**self).read_block(address, buf, mode)
    }

    fn write_block(&mut self, address: u32, buf: &[u32], mode: AddressMode) -> Result<(), BusError> {
        (**self).write_block(address, buf, mode)
    }

    fn poll(&mut self) -> Result<bool, BusError> {
        (**self).poll()
    }

    fn wait(&mut self) -> Result<(), BusError> {
        (**self).wait()
    }

    fn has_fault(&self) -> bool {
        (**self).has_fault()
    }

    fn clear_fault(&mut self) {
        (**self).clear_fault()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn kill(&mut self) {
        (**self).kill()
    }
}

/// Addresses of the debug port's two registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugPort {
    /// Control/status register: command word in, stall and status bits out.
    pub ctrl: u32,
    /// Data register: value of the currently selected CPU register.
    pub data: u32,
}

impl DebugPort {
    pub const DEFAULT_CTRL: u32 = 0x0000_0408;
    pub const DEFAULT_DATA: u32 = 0x0000_0409;
}

impl Default for DebugPort {
    fn default() -> Self {
        Self {
            ctrl: Self::DEFAULT_CTRL,
            data: Self::DEFAULT_DATA,
        }
    }
}
