//! Telnet transport: a TCP stream with option negotiation refused.
//!
//! IOS vty lines speak enough of RFC 854 that a client which accepts the
//! server's ECHO and SUPPRESS-GO-AHEAD offers and declines everything else
//! ends up in plain character mode. No terminal options are implemented.

use async_trait::async_trait;
use bytes::BytesMut;
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::TransportConfig;
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental telnet stream decoder/encoder.
///
/// Decoding strips IAC sequences (which may be split across reads) and
/// produces the negotiation replies that must be written back.
#[derive(Debug)]
pub struct TelnetCodec {
    state: State,
    answered: Vec<(u8, u8)>,
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetCodec {
    /// Create a codec in the data state.
    pub fn new() -> Self {
        Self {
            state: State::Data,
            answered: Vec::new(),
        }
    }

    /// Decode `input`, appending application data to `data` and negotiation
    /// replies to `replies`.
    pub fn decode(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        let mut rest = input;

        while !rest.is_empty() {
            if self.state == State::Data {
                // Fast path: copy everything up to the next IAC.
                let end = memchr::memchr(IAC, rest).unwrap_or(rest.len());
                data.extend(rest[..end].iter().copied().filter(|&b| b != 0));
                rest = &rest[end..];
                if rest.is_empty() {
                    break;
                }
            }

            let byte = rest[0];
            rest = &rest[1..];

            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, _) => State::Data,
                (State::Iac, IAC) => {
                    data.push(IAC);
                    State::Data
                }
                (State::Iac, WILL | WONT | DO | DONT) => State::Negotiate(byte),
                (State::Iac, SB) => State::Subnegotiation,
                (State::Iac, _) => State::Data,
                (State::Negotiate(command), option) => {
                    self.answer(command, option, replies);
                    State::Data
                }
                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,
            };
        }
    }

    fn answer(&mut self, command: u8, option: u8, replies: &mut Vec<u8>) {
        let reply = match command {
            WILL if option == OPT_ECHO || option == OPT_SGA => DO,
            WILL => DONT,
            DO => WONT,
            // Options we never enabled are already off.
            _ => return,
        };

        if self.answered.contains(&(command, option)) {
            return;
        }
        self.answered.push((command, option));

        trace!("telnet: {} {} -> {}", command, option, reply);
        replies.extend_from_slice(&[IAC, reply, option]);
    }

    /// Encode outgoing data: escape IAC and send newlines as CR LF.
    pub fn encode(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len() + 2);
        let mut previous = 0u8;
        for &byte in input {
            match byte {
                IAC => out.extend_from_slice(&[IAC, IAC]),
                b'\n' if previous != b'\r' => out.extend_from_slice(b"\r\n"),
                _ => out.push(byte),
            }
            previous = byte;
        }
        out
    }
}

/// Telnet transport over any async byte stream (a `TcpStream` in production).
pub struct TelnetTransport<S = TcpStream> {
    stream: S,
    codec: TelnetCodec,
    read_buf: BytesMut,
}

impl TelnetTransport<TcpStream> {
    /// Open a TCP connection to the configured target.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let port = config.port();
        let stream = tokio::time::timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port,
            source,
        })?;

        stream.set_nodelay(true).map_err(TransportError::Io)?;
        Ok(Self::new(stream))
    }
}

impl<S> TelnetTransport<S> {
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: TelnetCodec::new(),
            read_buf: BytesMut::with_capacity(4096),
        }
    }
}

#[async_trait]
impl<S> Transport for TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let encoded = TelnetCodec::encode(data);
        self.stream
            .write_all(&encoded)
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            self.read_buf.clear();
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Ok(None);
            }

            let mut data = Vec::with_capacity(n);
            let mut replies = Vec::new();
            self.codec.decode(&self.read_buf, &mut data, &mut replies);

            if !replies.is_empty() {
                self.stream
                    .write_all(&replies)
                    .await
                    .map_err(TransportError::Io)?;
            }
            if !data.is_empty() {
                return Ok(Some(data));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(codec: &mut TelnetCodec, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::new();
        let mut replies = Vec::new();
        codec.decode(input, &mut data, &mut replies);
        (data, replies)
    }

    #[test]
    fn test_plain_data_passes_through() {
        let mut codec = TelnetCodec::new();
        let (data, replies) = decode(&mut codec, b"\r\nUser Access Verification\r\n\r\nUsername: ");
        assert_eq!(data, b"\r\nUser Access Verification\r\n\r\nUsername: ");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_negotiation_replies() {
        let mut codec = TelnetCodec::new();
        let input = [
            IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SGA, IAC, DO, 24, IAC, DO, 31, b'\r', b'\n',
        ];
        let (data, replies) = decode(&mut codec, &input);
        assert_eq!(data, b"\r\n");
        assert_eq!(
            replies,
            vec![IAC, DO, OPT_ECHO, IAC, DO, OPT_SGA, IAC, WONT, 24, IAC, WONT, 31]
        );

        // Repeated offers are not answered twice.
        let (_, replies) = decode(&mut codec, &[IAC, WILL, OPT_ECHO]);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_sequence_split_across_reads() {
        let mut codec = TelnetCodec::new();
        let (data, replies) = decode(&mut codec, &[b'a', IAC]);
        assert_eq!(data, b"a");
        assert!(replies.is_empty());

        let (data, replies) = decode(&mut codec, &[DO, 24, b'b']);
        assert_eq!(data, b"b");
        assert_eq!(replies, vec![IAC, WONT, 24]);
    }

    #[test]
    fn test_subnegotiation_discarded() {
        let mut codec = TelnetCodec::new();
        let input = [b'x', IAC, SB, 24, 1, IAC, SE, b'y'];
        let (data, _) = decode(&mut codec, &input);
        assert_eq!(data, b"xy");
    }

    #[test]
    fn test_escaped_iac_and_nul() {
        let mut codec = TelnetCodec::new();
        let (data, _) = decode(&mut codec, &[b'\r', 0, IAC, IAC, b'z']);
        assert_eq!(data, vec![b'\r', IAC, b'z']);
    }

    #[test]
    fn test_encode() {
        assert_eq!(TelnetCodec::encode(b"enable\n"), b"enable\r\n");
        assert_eq!(TelnetCodec::encode(b"n"), b"n");
        assert_eq!(TelnetCodec::encode(&[IAC]), vec![IAC, IAC]);
        assert_eq!(TelnetCodec::encode(b"a\r\n"), b"a\r\n");
    }

    #[tokio::test]
    async fn test_transport_over_mock_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(&[IAC, WILL, OPT_ECHO])
            .write(&[IAC, DO, OPT_ECHO])
            .read(b"router>")
            .write(b"enable\r\n")
            .build();

        let mut transport = TelnetTransport::new(stream);
        let chunk = transport.read().await.unwrap();
        assert_eq!(chunk.as_deref(), Some(&b"router>"[..]));

        transport.write(b"enable\n").await.unwrap();
        assert_eq!(transport.read().await.unwrap(), None);
    }
}
