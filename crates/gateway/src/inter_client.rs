//! Client side of the inter-server endpoint, used by shard processes and
//! the `rhea shards` command.

use {
    anyhow::{Context, Result, bail},
    futures::StreamExt,
    tokio::{
        io::AsyncWriteExt,
        net::{
            TcpStream, ToSocketAddrs,
            tcp::{OwnedReadHalf, OwnedWriteHalf},
        },
    },
    tokio_util::codec::{FramedRead, LinesCodec},
    tracing::trace,
};

use rhea_protocol::{MAX_FRAME_BYTES, RegisterParams, RequestFrame, ResponseFrame, methods};

use crate::{inter::parse_inter_uri, registry::ShardDescriptor};

/// A single registration session. Calls are issued one at a time.
pub struct InterClient {
    lines: FramedRead<OwnedReadHalf, LinesCodec>,
    write: OwnedWriteHalf,
    next_id: u64,
}

impl InterClient {
    /// Connect to a `net.tcp://host:port/` endpoint.
    pub async fn connect(uri: &str) -> Result<Self> {
        let (host, port) = parse_inter_uri(uri)?;
        Self::connect_addr((host.as_str(), port)).await
    }

    pub async fn connect_addr(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("failed to connect to inter-server endpoint")?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_BYTES)),
            write,
            next_id: 1,
        })
    }

    /// Send one request and wait for its response payload.
    pub async fn call(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let payload = RequestFrame::new(id, method, params).encode()?;
        trace!(method, id, "shard -> gateway");
        self.write.write_all(payload.as_bytes()).await?;

        let line = self
            .lines
            .next()
            .await
            .context("inter-server endpoint closed the session")??;
        let resp = ResponseFrame::decode(line.trim())?;
        if resp.id != id {
            bail!("response id {} does not match request id {id}", resp.id);
        }
        if let Some(err) = resp.error {
            bail!("{method} failed: {err}");
        }
        Ok(resp.payload.unwrap_or(serde_json::Value::Null))
    }

    pub async fn register(&mut self, name: &str, address: &str, port: u16) -> Result<bool> {
        let params = serde_json::to_value(RegisterParams {
            name: name.to_string(),
            address: address.to_string(),
            port,
        })?;
        let ok = self.call(methods::REGISTER, params).await?;
        Ok(ok.as_bool().unwrap_or(false))
    }

    pub async fn unregister(&mut self) -> Result<()> {
        self.call(methods::UNREGISTER, serde_json::Value::Null)
            .await?;
        Ok(())
    }

    pub async fn list(&mut self) -> Result<Vec<ShardDescriptor>> {
        let payload = self.call(methods::LIST, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(payload)?)
    }
}
