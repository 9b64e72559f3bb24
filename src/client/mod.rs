//! Client module
//!
//! Wire-protocol client for the server under test. `Connection` moves frames,
//! `Client` runs typed commands and `Subscriber` consumes pub/sub traffic.

mod connection;
mod subscriber;

pub use connection::Connection;
pub use subscriber::Subscriber;

use crate::commands::{
    Command, Del, Discard, Exec, ExecOutcome, Exists, Get, Hello, Merge, Multi, Ping, Publish,
    QueueReply, Queued, Set, SetOptions, SetReply, Watch,
};
use crate::config::Endpoint;
use crate::error::{ClientError, Result};
use crate::protocol::{ProtocolVersion, RespValue};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Command client over one connection
pub struct Client<T = TcpStream> {
    connection: Connection<T>,
    protocol: ProtocolVersion,
}

impl Client<TcpStream> {
    /// Connect to an endpoint and negotiate its protocol version
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let connection = Connection::connect(&endpoint.addr(), endpoint.connect_timeout()).await?;
        let mut client = Client::new(connection);

        if endpoint.protocol == ProtocolVersion::Resp3 {
            client.hello(ProtocolVersion::Resp3).await?;
        }

        info!(
            "Connected to {} at {} ({:?})",
            endpoint.name,
            endpoint.addr(),
            client.protocol
        );
        Ok(client)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Client<T> {
    /// Wrap an established connection; the session starts in RESP2
    pub fn new(connection: Connection<T>) -> Self {
        Client {
            connection,
            protocol: ProtocolVersion::Resp2,
        }
    }

    /// Protocol version of this session
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Execute any command
    ///
    /// Error replies become `ClientError::Server` unless the command decodes them.
    pub async fn run<C: Command>(&mut self, cmd: &C) -> Result<C::Output> {
        let reply = self.connection.request(&cmd.to_frame()).await?;
        debug!("{} -> {}", cmd.name(), reply);

        if let RespValue::Error(message) = &reply {
            if !cmd.decodes_errors() {
                return Err(ClientError::Server(message.clone()));
            }
        }

        cmd.parse_reply(reply)
    }

    /// HELLO: switch the session protocol and return the server properties
    pub async fn hello(&mut self, version: ProtocolVersion) -> Result<RespValue> {
        let properties = self.run(&Hello { version }).await?;
        self.protocol = version;
        self.connection.set_protocol(version);
        Ok(properties)
    }

    /// PING, expecting PONG
    pub async fn ping(&mut self) -> Result<()> {
        self.run(&Ping).await
    }

    /// Plain SET
    pub async fn set(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<SetReply> {
        self.run(&Set::new(key, value)).await
    }

    /// SET with EX/PX/KEEPTTL, NX/XX and GET options
    pub async fn set_with(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        options: SetOptions,
    ) -> Result<SetReply> {
        self.run(&Set::new(key, value).with_options(options)).await
    }

    pub async fn get(&mut self, key: impl Into<Bytes>) -> Result<Option<Bytes>> {
        self.run(&Get::new(key)).await
    }

    /// DEL one key, returning the number removed
    pub async fn del(&mut self, key: impl Into<Bytes>) -> Result<i64> {
        self.run(&Del::new(key)).await
    }

    pub async fn exists(&mut self, key: impl Into<Bytes>) -> Result<bool> {
        Ok(self.run(&Exists::new(key)).await? > 0)
    }

    pub async fn multi(&mut self) -> Result<()> {
        self.run(&Multi).await
    }

    /// Send a command inside an open MULTI block
    pub async fn queue<C: Command>(&mut self, cmd: C) -> Result<QueueReply> {
        self.run(&Queued(cmd)).await
    }

    pub async fn exec(&mut self) -> Result<ExecOutcome> {
        self.run(&Exec).await
    }

    pub async fn discard(&mut self) -> Result<()> {
        self.run(&Discard).await
    }

    pub async fn watch(&mut self, key: impl Into<Bytes>) -> Result<()> {
        self.run(&Watch::new(key)).await
    }

    /// PUBLISH, returning the receiver count
    pub async fn publish(
        &mut self,
        channel: impl Into<Bytes>,
        message: impl Into<Bytes>,
    ) -> Result<i64> {
        self.run(&Publish::new(channel, message)).await
    }

    pub async fn merge(&mut self) -> Result<()> {
        self.run(&Merge).await
    }

    /// Turn this session into a subscriber
    pub fn into_subscriber(self) -> Subscriber<T> {
        Subscriber::new(self.connection)
    }
}
