use std::time::Duration;
use log::{debug, info, warn};
use rmodbus::{client::ModbusRequest, guess_response_frame_len, ModbusProto};
use tokio::{io::{AsyncReadExt, AsyncWriteExt}, net::TcpStream};

#[cfg(feature = "serial")]
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{LinkKind, Transport, TransportError};

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFraming {
    Tcp,
    RtuOverTcp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Serial { path: String, baud_rate: u32 },
    Gateway { host: String, port: u16, framing: GatewayFraming },
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(feature = "serial")]
    Serial(SerialStream),
}

impl Stream {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.write_all(data).await,
            #[cfg(feature = "serial")]
            Stream::Serial(port) => {
                port.write_all(data).await?;
                port.flush().await
            }
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.read_exact(buf).await.map(|_| ()),
            #[cfg(feature = "serial")]
            Stream::Serial(port) => port.read_exact(buf).await.map(|_| ()),
        }
    }

    async fn shutdown(&mut self) {
        match self {
            Stream::Tcp(stream) => { let _ = stream.shutdown().await; }
            #[cfg(feature = "serial")]
            Stream::Serial(_) => {}
        }
    }
}

/// Modbus client over a serial line or a gateway, frames built by rmodbus.
///
/// The connection is opened lazily on the first request and re-opened after
/// I/O failures. Failed requests are retried `retries` times unless the
/// meter answered with an exception.
pub struct ModbusLink {
    endpoint: Endpoint,
    timeout: Duration,
    retries: u32,
    stream: Option<Stream>,
}

impl ModbusLink {
    pub fn new(endpoint: Endpoint, timeout: Duration, retries: u32) -> Self {
        ModbusLink { endpoint, timeout, retries, stream: None }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn proto(&self) -> ModbusProto {
        match self.endpoint {
            Endpoint::Gateway { framing: GatewayFraming::Tcp, .. } => ModbusProto::TcpUdp,
            /* RTU frames carry the CRC, also when tunneled through TCP */
            _ => ModbusProto::Rtu,
        }
    }

    async fn connect(&self) -> Result<Stream, TransportError> {
        match &self.endpoint {
            Endpoint::Gateway { host, port, .. } => {
                let socket_addr = format!("{}:{}", host, port);
                let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&socket_addr))
                    .await
                    .map_err(|_| TransportError::timeout())?
                    .map_err(TransportError::io)?;
                let _ = stream.set_nodelay(true);
                info!("Connected to gateway {socket_addr}");
                Ok(Stream::Tcp(stream))
            }
            #[cfg(feature = "serial")]
            Endpoint::Serial { path, baud_rate } => {
                let port = tokio_serial::new(path, *baud_rate)
                    .data_bits(tokio_serial::DataBits::Eight)
                    .parity(tokio_serial::Parity::None)
                    .stop_bits(tokio_serial::StopBits::One)
                    .timeout(self.timeout)
                    .open_native_async()
                    .map_err(|e| TransportError { code: None, message: Some(format!("Failed to open serial port {path}: {e}")), retryable: true })?;
                info!("Opened serial port {path} at {baud_rate} baud");
                Ok(Stream::Serial(port))
            }
            #[cfg(not(feature = "serial"))]
            Endpoint::Serial { path, .. } => {
                Err(TransportError::frame(format!("Can not open {path}, built without serial support")))
            }
        }
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        if self.stream.is_none() {
            self.stream = Some(self.connect().await?);
        }
        let proto = self.proto();
        let timeout = self.timeout;
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Err(TransportError::frame("no connection".to_string())),
        };

        let exchange = async {
            stream.write_all(request).await.map_err(TransportError::io)?;

            /* MBAP header for TCP, address + function + byte count for RTU */
            let header_len = if proto == ModbusProto::TcpUdp { 6 } else { 3 };
            let mut response = vec![0u8; header_len];
            stream.read_exact(&mut response).await.map_err(TransportError::io)?;

            let len = guess_response_frame_len(&response, proto)
                .map_err(|e| TransportError::frame(format!("Failed to determine response length: {:?}", e)))? as usize;
            if len > header_len {
                response.resize(len, 0);
                stream.read_exact(&mut response[header_len..]).await.map_err(TransportError::io)?;
            }
            Ok::<Vec<u8>, TransportError>(response)
        };

        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::timeout())??;
        debug!("TX {:02x?} RX {:02x?}", request, response);

        /* exceptions set the high bit of the function code */
        let function_at = if proto == ModbusProto::TcpUdp { 7 } else { 1 };
        if response.len() > function_at + 1 && response[function_at] & 0x80 != 0 {
            return Err(TransportError::exception(response[function_at + 1]));
        }
        Ok(response)
    }

    async fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut retries = 0;
        loop {
            match self.exchange(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.retryable && retries < self.retries => {
                    warn!("Bus error, retrying ({}/{}): {}", retries + 1, self.retries, e);
                    retries += 1;
                    /* whatever is left in the line belongs to the failed request */
                    self.drop_stream().await;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    /* only an exception response leaves the line clean */
                    if e.code.is_none() {
                        self.drop_stream().await;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn drop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await;
        }
    }

    async fn read_registers(&mut self, holding: bool, address: u16, count: u16, unit_id: u8) -> Result<Vec<u16>, TransportError> {
        let mut mreq = ModbusRequest::new(unit_id, self.proto());
        let mut request = Vec::new();
        let generated = if holding {
            mreq.generate_get_holdings(address, count, &mut request)
        } else {
            mreq.generate_get_inputs(address, count, &mut request)
        };
        generated.map_err(|e| TransportError::frame(format!("Failed to build request: {:?}", e)))?;

        let response = self.transact(&request).await?;
        let mut data = Vec::new();
        mreq.parse_u16(&response, &mut data)
            .map_err(|e| TransportError::frame(format!("Failed to parse response: {:?}", e)))?;
        Ok(data)
    }
}

impl Transport for ModbusLink {
    async fn read_holding_registers(&mut self, address: u16, count: u16, unit_id: u8) -> Result<Vec<u16>, TransportError> {
        self.read_registers(true, address, count, unit_id).await
    }

    async fn read_input_registers(&mut self, address: u16, count: u16, unit_id: u8) -> Result<Vec<u16>, TransportError> {
        self.read_registers(false, address, count, unit_id).await
    }

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16], unit_id: u8) -> Result<(), TransportError> {
        let mut mreq = ModbusRequest::new(unit_id, self.proto());
        let mut request = Vec::new();
        mreq.generate_set_holdings_bulk(address, values, &mut request)
            .map_err(|e| TransportError::frame(format!("Failed to build request: {:?}", e)))?;

        let response = self.transact(&request).await?;
        mreq.parse_ok(&response)
            .map_err(|e| TransportError::frame(format!("Failed to parse response: {:?}", e)))
    }

    async fn close(&mut self) {
        self.drop_stream().await;
        debug!("Link closed");
    }

    async fn reopen(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        match &mut self.endpoint {
            Endpoint::Serial { baud_rate: current, .. } => *current = baud_rate,
            Endpoint::Gateway { .. } => {
                return Err(TransportError::frame("The baud rate of a gateway link is set on the gateway".to_string()));
            }
        }
        self.drop_stream().await;
        self.stream = Some(self.connect().await?);
        Ok(())
    }

    fn link_kind(&self) -> LinkKind {
        match self.endpoint {
            Endpoint::Serial { .. } => LinkKind::Serial,
            Endpoint::Gateway { .. } => LinkKind::Gateway,
        }
    }
}
