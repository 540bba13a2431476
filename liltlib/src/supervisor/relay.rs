use crate::events::{Event, EventSink, OutputChunk, Stream};
use crate::types::JobId;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    task::JoinHandle,
};
use tracing::debug;

const RELAY_BUFFER_SIZE: usize = 1024;

/// Drain `reader` into the sink until end of stream or the first read error.
pub(super) fn spawn<R>(
    job_id: JobId,
    stream: Stream,
    mut reader: R,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(RELAY_BUFFER_SIZE);
        loop {
            buf.reserve(RELAY_BUFFER_SIZE);
            match reader.read_buf(&mut buf).await {
                Ok(n) if n > 0 => {
                    if let Some(chunk) = take_complete(stream, &mut buf) {
                        sink.publish(Event::Output { job_id, chunk });
                    }
                }
                Ok(_) => break,
                Err(err) => {
                    debug!(%job_id, %stream, error = %err, "output stream read failed");
                    break;
                }
            }
        }
        // whatever is left is a truncated character; flush it as-is
        if !buf.is_empty() {
            sink.publish(Event::Output {
                job_id,
                chunk: into_chunk(stream, buf),
            });
        }
        debug!(%job_id, %stream, "output stream closed");
    })
}

/// Split off the buffered bytes up to the last complete UTF-8 character.
fn take_complete(stream: Stream, buf: &mut BytesMut) -> Option<OutputChunk> {
    let complete = complete_prefix_len(buf);
    if complete == 0 {
        return None;
    }
    Some(into_chunk(stream, buf.split_to(complete)))
}

fn into_chunk(stream: Stream, bytes: BytesMut) -> OutputChunk {
    let raw = bytes.freeze();
    OutputChunk {
        stream,
        data: String::from_utf8_lossy(&raw).into_owned(),
        raw,
    }
}

/// Length of `bytes` without a trailing, not yet complete, multi-byte sequence.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}
