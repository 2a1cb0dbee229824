//! In-process RESP server used by the backend tests.
//!
//! Understands just enough of the protocol for the workload: `HGETALL`,
//! `HSET`/`HMSET` and `DEL` against an in-memory map. Anything else (the
//! client's connection setup, e.g. `CLIENT SETINFO`) is answered with `+OK`.

use loadgen_core::ConnectionParams;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Hash = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
struct StubState {
    hashes: Mutex<HashMap<Vec<u8>, Hash>>,
    accepted: AtomicUsize,
    failing_reads: AtomicUsize,
}

pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(StubState::default());

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self { addr, state, task }
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            url: format!("redis://{}/", self.addr),
            connect_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(2),
        }
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Answer the next `n` `HGETALL`s with an error reply.
    pub fn fail_next_reads(&self, n: usize) {
        self.state.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn hash_len(&self, key: &str) -> usize {
        self.state
            .hashes
            .lock()
            .unwrap()
            .get(key.as_bytes())
            .map_or(0, |h| h.len())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.hashes.lock().unwrap().contains_key(key.as_bytes())
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<StubState>) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    while let Some(command) = read_command(&mut reader).await? {
        let reply = state.reply(&command);
        write.write_all(&reply).await?;
    }
    Ok(())
}

fn invalid(line: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("unexpected line {line:?}"))
}

async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count: usize = line
        .trim_end()
        .strip_prefix('*')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| invalid(&line))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len: usize = line
            .trim_end()
            .strip_prefix('$')
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| invalid(&line))?;
        let mut arg = vec![0; len + 2];
        reader.read_exact(&mut arg).await?;
        arg.truncate(len);
        args.push(arg);
    }
    Ok(Some(args))
}

fn bulk(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(format!("${}\r\n", value.len()).as_bytes());
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

impl StubState {
    fn take_failing_read(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn reply(&self, command: &[Vec<u8>]) -> Vec<u8> {
        let name = command
            .first()
            .map(|c| String::from_utf8_lossy(c).to_uppercase())
            .unwrap_or_default();
        let mut hashes = self.hashes.lock().unwrap();

        match (name.as_str(), command) {
            ("HGETALL", [_, key]) => {
                if self.take_failing_read() {
                    return b"-ERR injected failure\r\n".to_vec();
                }
                let mut out = Vec::new();
                match hashes.get(key) {
                    Some(hash) => {
                        out.extend_from_slice(format!("*{}\r\n", hash.len() * 2).as_bytes());
                        for (field, value) in hash {
                            bulk(&mut out, field);
                            bulk(&mut out, value);
                        }
                    }
                    None => out.extend_from_slice(b"*0\r\n"),
                }
                out
            }
            ("HSET" | "HMSET", [_, key, pairs @ ..]) if pairs.len() % 2 == 0 => {
                let hash = hashes.entry(key.clone()).or_default();
                let mut added = 0;
                for pair in pairs.chunks(2) {
                    if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                if name == "HMSET" {
                    b"+OK\r\n".to_vec()
                } else {
                    format!(":{added}\r\n").into_bytes()
                }
            }
            ("DEL", [_, keys @ ..]) => {
                let removed = keys.iter().filter(|k| hashes.remove(*k).is_some()).count();
                format!(":{removed}\r\n").into_bytes()
            }
            _ => b"+OK\r\n".to_vec(),
        }
    }
}
