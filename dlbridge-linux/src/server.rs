//! Local channel server: length-prefixed call frames over TCP, answered through the
//! channel queue. Responses go out as they complete; the call id correlates them.

use std::io;

use dlbridge_core::wire::{self, LEN_SIZE, MAX_FRAME_LEN};
use dlbridge_core::{ChannelHandle, ErrorCode, Reply, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Bind the server socket on loopback.
pub async fn bind(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port)).await
}

/// Accept connections until the listener fails. Each connection gets its own task.
pub async fn run_server(listener: TcpListener, handle: ChannelHandle) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "connection accepted");
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(err) = run_connection(stream, handle).await {
                tracing::warn!(%peer, error = %err, "connection dropped");
            }
            tracing::debug!(%peer, "connection closed");
        });
    }
}

/// Serve one connection: the reader loop forwards each call to the queue, a writer task
/// sends encoded responses back in completion order.
async fn run_connection(stream: TcpStream, handle: ChannelHandle) -> io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.write_all(&frame).await.is_err() || writer.flush().await.is_err() {
                break;
            }
        }
    });

    loop {
        let mut len_buf = [0u8; LEN_SIZE];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "frame too large",
            ));
        }
        let mut frame = vec![0u8; LEN_SIZE + len as usize];
        frame[..LEN_SIZE].copy_from_slice(&len_buf);
        reader.read_exact(&mut frame[LEN_SIZE..]).await?;
        let (call, _) = wire::decode_call(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Reading stops while the queue is full, so in-flight calls stay bounded.
        let id = call.id;
        let pending = match handle.submit(call).await {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!(id, error = %err, "call dropped");
                break;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            match pending.wait().await {
                Ok(response) => {
                    let _ = tx.send(encode(response));
                }
                Err(err) => tracing::warn!(id, error = %err, "call dropped"),
            }
        });
    }

    // In-flight calls hold their own senders; the writer drains them before exiting.
    drop(tx);
    let _ = writer_task.await;
    Ok(())
}

/// Encode a response, replacing it with an ERROR reply if it cannot be framed.
fn encode(response: Response) -> Vec<u8> {
    let id = response.id;
    match wire::encode_response(&response) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::error!(id, error = %err, "response could not be framed");
            let fallback = Response {
                id,
                reply: Reply::Error {
                    code: ErrorCode::Error.as_str().to_string(),
                    message: String::from("response could not be framed"),
                    details: Some(err.to_string()),
                },
            };
            wire::encode_response(&fallback).unwrap_or_default()
        }
    }
}
