//! Memcache wire helpers shared by both memcache drivers.
//!
//! Data commands go through the `memcache` crate. Key enumeration needs
//! `lru_crawler metadump`, which no client crate exposes, so it is issued
//! here on a short-lived text-protocol connection.

use crate::error::{CacheError, CacheResult};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

/// Longest key the server accepts.
pub const MAX_KEY_LENGTH: usize = 250;

/// Expiry values above this are read by the server as a unix timestamp.
pub(crate) const RELATIVE_EXPIRY_LIMIT: u64 = 30 * 24 * 60 * 60;

/// An absolute expiry already in the past; the item expires on write.
pub const EXPIRE_NOW: u32 = RELATIVE_EXPIRY_LIMIT as u32 + 1;

/// Convert a TTL into a memcache expiry field.
///
/// `None`/zero become `0` (never). TTLs up to thirty days are sent as
/// relative seconds; longer ones as an absolute timestamp.
pub fn expiration(ttl: Option<Duration>) -> u32 {
    let Some(secs) = crate::ttl::expiry_seconds(ttl) else {
        return 0;
    };

    if secs <= RELATIVE_EXPIRY_LIMIT {
        return secs as u32;
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    now.saturating_add(secs).min(u64::from(u32::MAX)) as u32
}

/// Percent-encode a backend key so spaces and control characters survive
/// the line protocol.
pub fn encode_key(full_key: &str) -> CacheResult<String> {
    let encoded = urlencoding::encode(full_key).into_owned();
    if encoded.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds {} bytes once encoded: {}",
            MAX_KEY_LENGTH, full_key
        )));
    }
    Ok(encoded)
}

/// Recover a backend key from a metadump line.
///
/// Metadump escapes keys once more on output, so two decoding passes undo
/// both that and [`encode_key`].
pub fn decode_dumped_key(raw: &str) -> Option<String> {
    let once = urlencoding::decode(raw).ok()?;
    let twice = urlencoding::decode(&once).ok()?;
    Some(twice.into_owned())
}

/// List the backend keys of all live items on `host:port`.
///
/// Not bounded in time; callers wrap it in their own timeout.
///
/// # Errors
///
/// Returns [`CacheError::Protocol`] when the server refuses the crawler
/// (`BUSY`, `ERROR`, or a daemon too old to know the command).
pub async fn metadump(host: &str, port: u16) -> CacheResult<Vec<String>> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    dump_keys(stream).await
}

/// Run `lru_crawler metadump all` over `stream`.
///
/// Items whose `exp` lies in the past are skipped; the server removes
/// them lazily.
async fn dump_keys<S>(stream: S) -> CacheResult<Vec<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufStream::new(stream);
    stream.write_all(b"lru_crawler metadump all\r\n").await?;
    stream.flush().await?;

    let now = chrono::Utc::now().timestamp();
    let mut keys = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Err(CacheError::Connection("memcache server closed the connection".into()));
        }
        let reply = line.trim_end_matches(['\r', '\n']);

        if reply == "END" {
            return Ok(keys);
        }
        if reply.starts_with("BUSY") || is_error(reply) {
            return Err(CacheError::Protocol(format!("unexpected reply: {}", reply)));
        }

        let mut key = None;
        let mut expired = false;
        for field in reply.split_whitespace() {
            if let Some(raw) = field.strip_prefix("key=") {
                key = decode_dumped_key(raw);
            } else if let Some(exp) = field.strip_prefix("exp=") {
                let exp: i64 = exp.parse().unwrap_or(-1);
                expired = exp > 0 && exp <= now;
            }
        }

        if let Some(key) = key.filter(|_| !expired) {
            keys.push(key);
        }
    }
}

fn is_error(line: &str) -> bool {
    line == "ERROR" || line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR")
}
