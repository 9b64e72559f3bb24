//! In-process stub server for integration tests
//!
//! Speaks enough of the command contract for every harness to run against it:
//! SET with options, GET, DEL, EXISTS, MULTI/EXEC/DISCARD/WATCH with rollback,
//! SUBSCRIBE/UNSUBSCRIBE/PUBLISH, MERGE and HELLO. `Quirks` inject one divergence at a time.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use kvcontract::config::{ConformanceConfig, Endpoint};
use kvcontract::protocol::{ProtocolVersion, RespEncoder, RespParser, RespValue};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Deliberate contract violations
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// SET NX overwrites existing keys
    pub ignore_nx: bool,
    /// A failing command inside EXEC leaves earlier writes applied
    pub no_rollback: bool,
    /// PUBLISH counts subscribers but delivers nothing
    pub drop_pubsub: bool,
    /// EXEC ignores changes to watched keys
    pub ignore_watch: bool,
    /// DISCARD runs the queued commands
    pub discard_applies: bool,
    /// MERGE replays every logged write, deletes included
    pub merge_resurrects_deleted: bool,
    /// A SET without options stores the value but replies null
    pub null_set: bool,
}

#[derive(Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<Bytes, Entry>,
    /// Write counter per key, for WATCH
    versions: HashMap<Bytes, u64>,
    /// Append log of writes; None marks a delete
    log: Vec<(Bytes, Option<Bytes>)>,
    subscribers: HashMap<Bytes, Vec<(u64, mpsc::UnboundedSender<RespValue>)>>,
}

struct Shared {
    state: Mutex<State>,
    quirks: Quirks,
    next_session: AtomicU64,
}

/// Running stub server, stopped on drop
pub struct StubServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        Self::with_quirks(Quirks::default()).await
    }

    pub async fn with_quirks(quirks: Quirks) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            quirks,
            next_session: AtomicU64::new(1),
        });

        let accept_shared = shared.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let shared = accept_shared.clone();
                tokio::spawn(serve(socket, shared));
            }
        });

        StubServer {
            addr,
            shared,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self, protocol: ProtocolVersion) -> Endpoint {
        Endpoint {
            name: "stub".to_string(),
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            protocol,
            connect_timeout_ms: 2000,
        }
    }

    /// Live keys, in no particular order
    pub fn keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        let state = self.shared.state.lock().unwrap();
        state
            .entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Live keys
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        let state = self.shared.state.lock().unwrap();
        state.entries.values().filter(|e| e.is_live(now)).count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Small conformance settings so the suite runs in a few seconds
pub fn fast_conformance() -> ConformanceConfig {
    ConformanceConfig {
        kv_dataset_size: 32,
        tx_dataset_size: 8,
        str_len: 24,
        expire_seconds: 1,
        expire_millis: 300,
        pubsub_message_count: 8,
        pubsub_timeout_ms: 1000,
        merge_dataset_size: 12,
        ..ConformanceConfig::default()
    }
}

struct Session {
    id: u64,
    protocol: ProtocolVersion,
    multi: Option<Vec<Vec<Bytes>>>,
    queue_error: bool,
    watched: Vec<(Bytes, u64)>,
    channels: HashSet<Bytes>,
    pushes: mpsc::UnboundedSender<RespValue>,
}

async fn serve(socket: TcpStream, shared: Arc<Shared>) {
    let (mut reader, mut writer) = socket.into_split();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        id: shared.next_session.fetch_add(1, Ordering::Relaxed),
        protocol: ProtocolVersion::Resp2,
        multi: None,
        queue_error: false,
        watched: Vec::new(),
        channels: HashSet::new(),
        pushes: push_tx,
    };
    let mut buf = BytesMut::with_capacity(4096);

    'session: loop {
        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                match read {
                    Ok(0) | Err(_) => break 'session,
                    Ok(_) => {}
                }
                loop {
                    let frame = match RespParser::parse(&mut buf) {
                        Ok(Some(frame)) => frame,
                        Ok(None) => break,
                        Err(_) => break 'session,
                    };
                    let replies = session.handle(&shared, frame);
                    let encoder = RespEncoder::new(session.protocol);
                    let mut out = BytesMut::new();
                    for reply in &replies {
                        encoder.encode_to(&mut out, reply);
                    }
                    if writer.write_all(&out).await.is_err() {
                        break 'session;
                    }
                }
            }
            Some(push) = push_rx.recv() => {
                let encoded = RespEncoder::new(session.protocol).encode(&push);
                if writer.write_all(&encoded).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    let mut state = shared.state.lock().unwrap();
    for subscribers in state.subscribers.values_mut() {
        subscribers.retain(|(id, _)| *id != session.id);
    }
}

fn ok() -> RespValue {
    RespValue::simple_string("OK")
}

fn upper(part: &Bytes) -> String {
    String::from_utf8_lossy(part).to_ascii_uppercase()
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "SET" | "GET" | "DEL" | "EXISTS" | "MERGE" | "PING" | "PUBLISH"
    )
}

impl Session {
    fn handle(&mut self, shared: &Shared, frame: RespValue) -> Vec<RespValue> {
        let parts: Option<Vec<Bytes>> = frame.into_array().and_then(|items| {
            items
                .into_iter()
                .map(|item| item.as_bulk_string().cloned())
                .collect()
        });
        let parts = match parts {
            Some(parts) if !parts.is_empty() => parts,
            _ => return vec![RespValue::error("ERR protocol error")],
        };
        let name = upper(&parts[0]);

        if self.multi.is_some() && !matches!(name.as_str(), "EXEC" | "DISCARD" | "MULTI" | "WATCH") {
            if !is_known(&name) {
                self.queue_error = true;
                return vec![RespValue::error(format!("ERR unknown command '{}'", name))];
            }
            if let Some(queue) = self.multi.as_mut() {
                queue.push(parts);
            }
            return vec![RespValue::simple_string("QUEUED")];
        }

        match name.as_str() {
            "HELLO" => {
                let version = parts.get(1).map(upper);
                match version.as_deref() {
                    None | Some("2") => self.protocol = ProtocolVersion::Resp2,
                    Some("3") => self.protocol = ProtocolVersion::Resp3,
                    Some(_) => return vec![RespValue::error("NOPROTO unsupported protocol version")],
                }
                vec![RespValue::Map(vec![
                    (RespValue::simple_string("server"), RespValue::simple_string("stub")),
                    (
                        RespValue::simple_string("proto"),
                        RespValue::Integer(i64::from(self.protocol.number())),
                    ),
                ])]
            }
            "MULTI" => {
                if self.multi.is_some() {
                    return vec![RespValue::error("ERR MULTI calls can not be nested")];
                }
                self.multi = Some(Vec::new());
                self.queue_error = false;
                vec![ok()]
            }
            "DISCARD" => match self.multi.take() {
                Some(queue) => {
                    self.watched.clear();
                    if shared.quirks.discard_applies {
                        let mut state = shared.state.lock().unwrap();
                        for parts in &queue {
                            state.execute(parts, false, &shared.quirks);
                        }
                    }
                    vec![ok()]
                }
                None => vec![RespValue::error("ERR DISCARD without MULTI")],
            },
            "WATCH" => {
                if self.multi.is_some() {
                    return vec![RespValue::error("ERR WATCH inside MULTI is not allowed")];
                }
                let state = shared.state.lock().unwrap();
                for key in &parts[1..] {
                    let version = state.versions.get(key).copied().unwrap_or(0);
                    self.watched.push((key.clone(), version));
                }
                vec![ok()]
            }
            "EXEC" => vec![self.exec(shared)],
            "SUBSCRIBE" => {
                let mut state = shared.state.lock().unwrap();
                parts[1..]
                    .iter()
                    .map(|channel| {
                        if self.channels.insert(channel.clone()) {
                            state
                                .subscribers
                                .entry(channel.clone())
                                .or_default()
                                .push((self.id, self.pushes.clone()));
                        }
                        RespValue::Push(vec![
                            RespValue::bulk_string("subscribe"),
                            RespValue::BulkString(channel.clone()),
                            RespValue::Integer(self.channels.len() as i64),
                        ])
                    })
                    .collect()
            }
            "UNSUBSCRIBE" => {
                let channels: Vec<Bytes> = if parts.len() > 1 {
                    parts[1..].to_vec()
                } else {
                    self.channels.iter().cloned().collect()
                };
                let mut state = shared.state.lock().unwrap();
                channels
                    .into_iter()
                    .map(|channel| {
                        if self.channels.remove(&channel) {
                            if let Some(subscribers) = state.subscribers.get_mut(&channel) {
                                subscribers.retain(|(id, _)| *id != self.id);
                            }
                        }
                        RespValue::Push(vec![
                            RespValue::bulk_string("unsubscribe"),
                            RespValue::BulkString(channel),
                            RespValue::Integer(self.channels.len() as i64),
                        ])
                    })
                    .collect()
            }
            "PUBLISH" => {
                if parts.len() != 3 {
                    return vec![RespValue::error("ERR wrong number of arguments for 'PUBLISH' command")];
                }
                let state = shared.state.lock().unwrap();
                let subscribers = state.subscribers.get(&parts[1]).map(Vec::as_slice).unwrap_or(&[]);
                let mut receivers = 0;
                for (_, sender) in subscribers {
                    let message = RespValue::Push(vec![
                        RespValue::bulk_string("message"),
                        RespValue::BulkString(parts[1].clone()),
                        RespValue::BulkString(parts[2].clone()),
                    ]);
                    if shared.quirks.drop_pubsub || sender.send(message).is_ok() {
                        receivers += 1;
                    }
                }
                vec![RespValue::Integer(receivers)]
            }
            "PING" => vec![RespValue::simple_string("PONG")],
            _ => {
                let mut state = shared.state.lock().unwrap();
                vec![state.execute(&parts, false, &shared.quirks)]
            }
        }
    }

    fn exec(&mut self, shared: &Shared) -> RespValue {
        let queue = match self.multi.take() {
            Some(queue) => queue,
            None => return RespValue::error("ERR EXEC without MULTI"),
        };
        let watched = std::mem::take(&mut self.watched);

        if self.queue_error {
            self.queue_error = false;
            return RespValue::error("EXECABORT Transaction discarded because of previous errors.");
        }

        let mut state = shared.state.lock().unwrap();
        let changed = watched
            .iter()
            .any(|(key, version)| state.versions.get(key).copied().unwrap_or(0) != *version);
        if changed && !shared.quirks.ignore_watch {
            return RespValue::Null;
        }

        let entries = state.entries.clone();
        let log_len = state.log.len();
        let mut replies = Vec::with_capacity(queue.len());
        for parts in &queue {
            let reply = state.execute(parts, true, &shared.quirks);
            if let RespValue::Error(_) = reply {
                if !shared.quirks.no_rollback {
                    state.entries = entries;
                    state.log.truncate(log_len);
                }
                return RespValue::Null;
            }
            replies.push(reply);
        }

        RespValue::Array(replies)
    }
}

impl State {
    fn live(&mut self, key: &Bytes, now: Instant) -> Option<&Entry> {
        if self.entries.get(key).map_or(false, |e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get(key)
    }

    fn touch(&mut self, key: &Bytes, value: Option<Bytes>) {
        *self.versions.entry(key.clone()).or_insert(0) += 1;
        self.log.push((key.clone(), value));
    }

    fn execute(&mut self, parts: &[Bytes], in_tx: bool, quirks: &Quirks) -> RespValue {
        let now = Instant::now();
        let name = upper(&parts[0]);
        match name.as_str() {
            "SET" => self.set(parts, now, quirks),
            "GET" if parts.len() == 2 => match self.live(&parts[1], now) {
                Some(entry) => RespValue::BulkString(entry.value.clone()),
                None => RespValue::Null,
            },
            "DEL" if parts.len() >= 2 => {
                let mut removed = 0;
                for key in &parts[1..] {
                    if self.live(key, now).is_some() {
                        self.entries.remove(key);
                        self.touch(key, None);
                        removed += 1;
                    } else if in_tx {
                        return RespValue::error("ERR no such key");
                    }
                }
                RespValue::Integer(removed)
            }
            "EXISTS" if parts.len() >= 2 => {
                let count = parts[1..]
                    .iter()
                    .filter(|key| self.live(key, now).is_some())
                    .count();
                RespValue::Integer(count as i64)
            }
            "MERGE" if quirks.merge_resurrects_deleted => {
                for (key, value) in &self.log {
                    if let Some(value) = value {
                        self.entries.insert(
                            key.clone(),
                            Entry {
                                value: value.clone(),
                                expires_at: None,
                            },
                        );
                    }
                }
                ok()
            }
            "MERGE" => {
                self.entries.retain(|_, entry| entry.is_live(now));
                self.log = self
                    .entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), Some(entry.value.clone())))
                    .collect();
                ok()
            }
            "GET" | "DEL" | "EXISTS" => {
                RespValue::error(format!("ERR wrong number of arguments for '{}' command", name))
            }
            _ => RespValue::error(format!("ERR unknown command '{}'", name)),
        }
    }

    fn set(&mut self, parts: &[Bytes], now: Instant, quirks: &Quirks) -> RespValue {
        if parts.len() < 3 {
            return RespValue::error("ERR wrong number of arguments for 'SET' command");
        }
        let key = parts[1].clone();
        let value = parts[2].clone();

        let mut expiry: Option<Option<Instant>> = None;
        let mut keep_ttl = false;
        let mut nx = false;
        let mut xx = false;
        let mut get = false;

        let mut i = 3;
        while i < parts.len() {
            match upper(&parts[i]).as_str() {
                "NX" => nx = true,
                "XX" => xx = true,
                "GET" => get = true,
                "KEEPTTL" => keep_ttl = true,
                unit @ ("EX" | "PX") => {
                    let amount = parts
                        .get(i + 1)
                        .and_then(|n| std::str::from_utf8(n).ok())
                        .and_then(|n| n.parse::<u64>().ok());
                    let amount = match amount {
                        Some(amount) if amount > 0 => amount,
                        _ => return RespValue::error("ERR invalid expire time in 'set' command"),
                    };
                    let ttl = if unit == "EX" {
                        Duration::from_secs(amount)
                    } else {
                        Duration::from_millis(amount)
                    };
                    expiry = Some(Some(now + ttl));
                    i += 1;
                }
                _ => return RespValue::error("ERR syntax error"),
            }
            i += 1;
        }
        if nx && xx {
            return RespValue::error("ERR syntax error");
        }

        let previous = self.live(&key, now).cloned();
        let exists = previous.is_some();
        let old_value = || match &previous {
            Some(entry) => RespValue::BulkString(entry.value.clone()),
            None => RespValue::Null,
        };

        if (nx && exists && !quirks.ignore_nx) || (xx && !exists) {
            return if get { old_value() } else { RespValue::Null };
        }

        let expires_at = match expiry {
            Some(at) => at,
            None if keep_ttl => previous.as_ref().and_then(|e| e.expires_at),
            None => None,
        };
        let reply = if get {
            old_value()
        } else if quirks.null_set && parts.len() == 3 {
            RespValue::Null
        } else {
            ok()
        };

        self.entries.insert(
            key.clone(),
            Entry {
                value: value.clone(),
                expires_at,
            },
        );
        self.touch(&key, Some(value));
        reply
    }
}
