use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::client::message::{Promise, Request, RequestDetails};
use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::MultipleWrite;
use crate::client::requests::write_single::SingleWrite;
use crate::client::task::ClientLoop;
use crate::client::RequestParam;
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::tcp::client::TcpChannelTask;
use crate::types::{AddressRange, Indexed, WriteMultiple};

/// Controls how long the channel task waits between failed connection attempts
pub trait ReconnectStrategy {
    /// reset the strategy to its minimum delay after a successful connection
    fn reset(&mut self);
    /// the delay to wait before the next connection attempt
    fn next_delay(&mut self) -> Duration;
}

/// Stock [`ReconnectStrategy`] implementations
pub mod strategy {
    use std::time::Duration;

    use super::ReconnectStrategy;

    /// doubling strategy from 100 ms to 5 seconds
    pub fn default() -> Box<dyn ReconnectStrategy + Send> {
        doubling(Duration::from_millis(100), Duration::from_secs(5))
    }

    /// strategy that doubles the delay on each failure, bounded by `min` and `max`
    pub fn doubling(min: Duration, max: Duration) -> Box<dyn ReconnectStrategy + Send> {
        Doubling::create(min, max)
    }

    struct Doubling {
        min: Duration,
        max: Duration,
        current: Duration,
    }

    impl Doubling {
        fn create(min: Duration, max: Duration) -> Box<dyn ReconnectStrategy + Send> {
            Box::new(Doubling {
                min,
                max,
                current: min,
            })
        }
    }

    impl ReconnectStrategy for Doubling {
        fn reset(&mut self) {
            self.current = self.min;
        }

        fn next_delay(&mut self) -> Duration {
            let ret = self.current;
            self.current = std::cmp::min(2 * self.current, self.max);
            ret
        }
    }
}

/// Handle used to issue typed requests to the channel task that owns the
/// connection. Cloning the handle allows multiple callers to pipeline
/// requests onto the same connection.
#[derive(Clone)]
pub struct Channel {
    pub(crate) tx: mpsc::Sender<Request>,
}

impl Channel {
    pub(crate) fn spawn(
        addr: SocketAddr,
        max_queued_requests: usize,
        retry: Box<dyn ReconnectStrategy + Send>,
        decode: DecodeLevel,
    ) -> Channel {
        let (tx, rx) = mpsc::channel(max_queued_requests);
        let task = async move {
            TcpChannelTask::new(addr, retry, ClientLoop::new(rx.into(), decode))
                .run()
                .await
        };
        tokio::spawn(task.instrument(tracing::info_span!("Modbus-Client-TCP", "endpoint" = ?addr)));
        Channel { tx }
    }

    /// Read a range of coils (function code `0x01`)
    pub async fn read_coils(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = ReadBits::new(range.of_read_bits()?, Promise::Channel(tx));
        self.send(param, RequestDetails::ReadCoils(request)).await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Read a range of discrete inputs (function code `0x02`)
    pub async fn read_discrete_inputs(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = ReadBits::new(range.of_read_bits()?, Promise::Channel(tx));
        self.send(param, RequestDetails::ReadDiscreteInputs(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Read a range of holding registers (function code `0x03`)
    pub async fn read_holding_registers(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = ReadRegisters::new(range.of_read_registers()?, Promise::Channel(tx));
        self.send(param, RequestDetails::ReadHoldingRegisters(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Read a range of input registers (function code `0x04`)
    pub async fn read_input_registers(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = ReadRegisters::new(range.of_read_registers()?, Promise::Channel(tx));
        self.send(param, RequestDetails::ReadInputRegisters(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Write a single coil (function code `0x05`)
    pub async fn write_single_coil(
        &mut self,
        param: RequestParam,
        value: Indexed<bool>,
    ) -> Result<Indexed<bool>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = SingleWrite::new(value, Promise::Channel(tx));
        self.send(param, RequestDetails::WriteSingleCoil(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Write a single holding register (function code `0x06`)
    pub async fn write_single_register(
        &mut self,
        param: RequestParam,
        value: Indexed<u16>,
    ) -> Result<Indexed<u16>, RequestError> {
        let (tx, rx) = oneshot::channel();
        let request = SingleWrite::new(value, Promise::Channel(tx));
        self.send(param, RequestDetails::WriteSingleRegister(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Write multiple coils (function code `0x0F`)
    pub async fn write_multiple_coils(
        &mut self,
        param: RequestParam,
        value: WriteMultiple<bool>,
    ) -> Result<AddressRange, RequestError> {
        let value = value.limited_to(crate::constants::limits::MAX_WRITE_COILS_COUNT)?;
        let (tx, rx) = oneshot::channel();
        let request = MultipleWrite::new(value, Promise::Channel(tx));
        self.send(param, RequestDetails::WriteMultipleCoils(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Write multiple holding registers (function code `0x10`)
    pub async fn write_multiple_registers(
        &mut self,
        param: RequestParam,
        value: WriteMultiple<u16>,
    ) -> Result<AddressRange, RequestError> {
        let value = value.limited_to(crate::constants::limits::MAX_WRITE_REGISTERS_COUNT)?;
        let (tx, rx) = oneshot::channel();
        let request = MultipleWrite::new(value, Promise::Channel(tx));
        self.send(param, RequestDetails::WriteMultipleRegisters(request))
            .await?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    async fn send(&mut self, param: RequestParam, details: RequestDetails) -> Result<(), RequestError> {
        let request = Request::new(param.id, param.response_timeout, details);
        self.tx
            .send(request)
            .await
            .map_err(|_| RequestError::Shutdown)
    }
}
