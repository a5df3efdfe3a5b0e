//! One request, one response, then close.

use std::{net::SocketAddr, sync::Arc};

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::{debug, warn};

use crate::{
    config::Limits,
    errors::FrameError,
    rpc::{processor, DispatchTable, RpcError, RpcResponse},
};

pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    table: Arc<DispatchTable>,
    limits: Limits,
) {
    let (reader, mut writer) = stream.split();

    let response = match read_with_timeout(reader, &limits).await {
        Ok(Some(line)) => processor::handle_payload(&table, &line).await,
        Ok(None) => {
            debug!(peer = %peer, "peer closed without sending a request");
            return;
        }
        Err(err) => {
            warn!(peer = %peer, error = %err, "malformed request frame");
            RpcResponse::failure(Value::Null, RpcError::internal(err.to_string()))
        }
    };

    if let Err(err) = write_response(&mut writer, &response).await {
        warn!(peer = %peer, error = %err, "failed to write response");
        return;
    }

    debug!(peer = %peer, "connection closed");
}

async fn read_with_timeout<R>(reader: R, limits: &Limits) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let read = read_request_line(reader, limits.max_request_bytes);
    match limits.read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| FrameError::Timeout(timeout))?,
        None => read.await,
    }
}

/// Reads up to the first `\n`, returning the line without its terminator.
///
/// `Ok(None)` means the peer closed the connection without sending anything.
pub async fn read_request_line<R>(reader: R, limit: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut bounded = BufReader::new(reader).take(limit as u64 + 1);
    let read = bounded.read_until(b'\n', &mut buffer).await?;

    if read == 0 {
        return Ok(None);
    }

    if buffer.last() != Some(&b'\n') {
        if buffer.len() > limit {
            return Err(FrameError::TooLarge { limit });
        }
        return Err(FrameError::Unterminated);
    }

    buffer.pop();
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }

    Ok(Some(buffer))
}

pub async fn write_response<W>(writer: &mut W, response: &RpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = response
        .to_line()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    writer.write_all(&line).await?;
    writer.flush().await?;
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::methods;

    #[tokio::test]
    async fn reads_line_without_terminator() {
        let line = read_request_line(&b"{\"a\":1}\r\nleftover"[..], 64)
            .await
            .expect("read")
            .expect("line");

        assert_eq!(line, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn empty_stream_is_no_request() {
        let line = read_request_line(&b""[..], 64).await.expect("read");

        assert!(line.is_none());
    }

    #[tokio::test]
    async fn unterminated_input_is_malformed() {
        let err = read_request_line(&b"{\"a\":1}"[..], 64)
            .await
            .expect_err("must fail");

        assert!(matches!(err, FrameError::Unterminated));
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let err = read_request_line(&b"0123456789\n"[..], 4)
            .await
            .expect_err("must fail");

        assert!(matches!(err, FrameError::TooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let line = read_request_line(&b"1234\n"[..], 4)
            .await
            .expect("read")
            .expect("line");

        assert_eq!(line, b"1234");
    }

    async fn serve_once(limits: Limits) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let mut table = DispatchTable::new();
        table.register("echo", methods::echo);
        let table = Arc::new(table);

        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.expect("accept");
            handle_connection(stream, peer, table, limits).await;
        });

        addr
    }

    async fn exchange(addr: SocketAddr, payload: &[u8], close_write: bool) -> serde_json::Value {
        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(payload).await.expect("write");
        if close_write {
            client.shutdown().await.expect("shutdown write");
        }

        let mut response = String::new();
        client.read_to_string(&mut response).await.expect("read");
        assert!(response.ends_with('\n'));
        serde_json::from_str(response.trim_end()).expect("valid json response")
    }

    #[tokio::test]
    async fn answers_one_request_and_closes() {
        let addr = serve_once(Limits::default()).await;

        let response = exchange(
            addr,
            b"{\"jsonrpc\":\"2.0\",\"method\":\"echo\",\"params\":[\"hi\"],\"id\":1}\n",
            false,
        )
        .await;

        assert_eq!(response, json!({"jsonrpc": "2.0", "result": "hi", "id": 1}));
    }

    #[tokio::test]
    async fn peer_closing_before_newline_gets_error() {
        let addr = serve_once(Limits::default()).await;

        let response = exchange(addr, b"{\"jsonrpc\":\"2.0\"", true).await;

        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(
            response["error"]["message"],
            "connection closed before newline delimiter"
        );
        assert!(response["id"].is_null());
    }

    #[tokio::test]
    async fn slow_peer_times_out() {
        let addr = serve_once(Limits {
            read_timeout: Some(Duration::from_millis(50)),
            ..Limits::default()
        })
        .await;

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(b"{\"jsonrpc\"").await.expect("write");

        let mut response = String::new();
        client.read_to_string(&mut response).await.expect("read");
        let response: serde_json::Value =
            serde_json::from_str(response.trim_end()).expect("valid json response");
        assert_eq!(response["error"]["code"], -32603);
        assert!(response["error"]["message"]
            .as_str()
            .expect("message")
            .starts_with("timed out"));
    }
}
