use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter, Result};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::protocol::{HttpRequest, HttpResponse, Method, Version};

// The request head (request line and headers) is read through `take` so a client can't grow the
// line buffer without bound; the body is then read exactly by Content-Length.
#[derive(Debug)]
pub(crate) struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    buffer: Vec<u8>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream) -> Connection {
        let (reader, writer) = stream.into_split();
        Connection {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            buffer: Vec::with_capacity(512),
        }
    }

    /// `None` once the client has closed the connection between requests.
    pub(crate) async fn read_request(&mut self) -> Result<Option<HttpRequest>> {
        read_request(&mut self.reader, &mut self.buffer).await
    }

    pub(crate) async fn write_response(&mut self, response: &HttpResponse) -> Result<()> {
        self.writer.write_all(response.head().as_bytes()).await?;
        self.writer.write_all(&response.body).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

const MAX_HEAD_SIZE: u64 = 8 * 1024;
const MAX_BODY_SIZE: usize = 64 * 1024;
const MAX_HEADERS: usize = 64;

fn invalid(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

async fn read_request<R: AsyncBufRead + Unpin>(r: &mut R, buf: &mut Vec<u8>) -> Result<Option<HttpRequest>> {
    let mut head = (&mut *r).take(MAX_HEAD_SIZE);

    let Some(request_line) = read_line(&mut head, buf).await? else {
        return Ok(None);
    };
    let (method, target, version) = parse_request_line(&request_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(&mut head, buf)
            .await?
            .ok_or_else(|| invalid("connection closed inside request head"))?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(invalid("too many headers"));
        }
        headers.push(parse_header(&line)?);
    }

    let mut request = HttpRequest {
        method,
        target,
        version,
        headers,
        body: Vec::new(),
    };

    if request.header("transfer-encoding").is_some() {
        return Err(invalid("transfer-encoding not supported"));
    }
    let length = match request.header("content-length") {
        Some(v) => v.trim().parse::<usize>().map_err(|_| invalid("malformed content-length"))?,
        None => 0,
    };
    if length > MAX_BODY_SIZE {
        return Err(invalid("body too large"));
    }
    let mut body = vec![0; length];
    r.read_exact(&mut body).await?;
    request.body = body;

    Ok(Some(request))
}

/// One line without its terminator. `None` on a clean EOF before any byte of the line.
async fn read_line<R: AsyncBufRead + Unpin>(r: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>> {
    buf.clear();
    let len = r.read_until(b'\n', buf).await?;
    if len == 0 {
        return Ok(None);
    }
    let Some(line) = buf.strip_suffix(b"\n") else {
        return Err(invalid("request head too large or truncated"));
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = std::str::from_utf8(line).map_err(|_| invalid("request head is not valid UTF-8"))?;
    Ok(Some(line.to_string()))
}

fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let mut parts = line.split(' ').filter(|part| !part.is_empty());

    let method = parts.next().ok_or_else(|| invalid("missing method"))?;
    let target = parts.next().ok_or_else(|| invalid("missing request target"))?;
    let version = parts.next().ok_or_else(|| invalid("missing http version"))?;
    if parts.next().is_some() {
        return Err(invalid("malformed request line"));
    }
    let version = Version::from_bytes(version.as_bytes())
        .ok_or_else(|| invalid(format!("unsupported version: {}", version)))?;
    if !target.starts_with('/') {
        return Err(invalid("request target must be an absolute path"));
    }
    Ok((Method::from_bytes(method.as_bytes()), target.to_string(), version))
}

fn parse_header(line: &str) -> Result<(String, String)> {
    let (name, value) = line.split_once(':').ok_or_else(|| invalid("malformed header"))?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(invalid("malformed header name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
