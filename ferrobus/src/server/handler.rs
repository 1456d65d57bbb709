use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::exception::ExceptionCode;
use crate::server::types::{WriteCoils, WriteRegisters};
use crate::types::{AddressRange, Indexed, UnitId};

/// Operations the server dispatches to a handler by function code.
///
/// All operations are synchronous and must not block. Each has a default
/// implementation that returns an ILLEGAL FUNCTION exception, so a handler
/// only implements the function codes it supports.
///
/// Multi-value writes must be atomic: implementations validate the entire
/// range before mutating any cell.
pub trait RequestHandler: Send + Sync + 'static {
    /// read a range of coils, returning the values or an exception code
    fn read_coils(&self, _range: AddressRange) -> Result<&[bool], ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// read a range of discrete inputs, returning the values or an exception code
    fn read_discrete_inputs(&self, _range: AddressRange) -> Result<&[bool], ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// read a range of holding registers, returning the values or an exception code
    fn read_holding_registers(&self, _range: AddressRange) -> Result<&[u16], ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// read a range of input registers, returning the values or an exception code
    fn read_input_registers(&self, _range: AddressRange) -> Result<&[u16], ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// write a single coil
    fn write_single_coil(&mut self, _value: Indexed<bool>) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// write a single holding register
    fn write_single_register(&mut self, _value: Indexed<u16>) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// write multiple coils atomically
    fn write_multiple_coils(&mut self, _values: WriteCoils) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// write multiple holding registers atomically
    fn write_multiple_registers(&mut self, _values: WriteRegisters) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Wrap the handler so it can be shared across connections. Reads take a
    /// shared lock, writes an exclusive one, preserving the atomicity of
    /// multi-value writes.
    fn wrap(self) -> ServerHandlerType<Self>
    where
        Self: Sized,
    {
        Arc::new(RwLock::new(self))
    }
}

/// Handler shared between connections: single writer, concurrent readers
pub type ServerHandlerType<T> = Arc<RwLock<T>>;

/// Maps unit ids to handlers. Frames addressed to an unmapped unit id are
/// logged and ignored.
pub struct ServerHandlerMap<T: RequestHandler> {
    handlers: BTreeMap<UnitId, ServerHandlerType<T>>,
}

// manual impl b/c T doesn't need to be Clone
impl<T: RequestHandler> Clone for ServerHandlerMap<T> {
    fn clone(&self) -> Self {
        ServerHandlerMap {
            handlers: self.handlers.clone(),
        }
    }
}

impl<T: RequestHandler> Default for ServerHandlerMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RequestHandler> ServerHandlerMap<T> {
    /// create an empty map
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// create a map with a single handler
    pub fn single(id: UnitId, handler: ServerHandlerType<T>) -> Self {
        let mut handlers = BTreeMap::new();
        handlers.insert(id, handler);
        Self { handlers }
    }

    /// retrieve the handler for a unit id, if one is mapped
    pub fn get(&self, id: UnitId) -> Option<&ServerHandlerType<T>> {
        self.handlers.get(&id)
    }

    /// add a handler for a unit id, replacing any previous one
    pub fn add(&mut self, id: UnitId, server: ServerHandlerType<T>) -> Option<ServerHandlerType<T>> {
        self.handlers.insert(id, server)
    }
}
