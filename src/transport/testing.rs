//! Loopback stand-in for the on-device SL4A server, used by unit tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use socket2::SockRef;
use tracing_subscriber::EnvFilter;

/// Routes crate logs to the test harness; filter with `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the fake server answers handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeMode {
    Accept,
    Reject,
    Silent,
    Hangup,
}

/// What the fake server does with one RPC.
pub(crate) enum Reply {
    Result(Value),
    Error(Value),
    WrongId(Value),
    Blank,
    Silent,
    Hangup,
    /// Abort the connection with a TCP reset.
    Reset,
}

pub(crate) type Handler = Arc<dyn Fn(&str, &[Value]) -> Reply + Send + Sync>;

fn echo_handler() -> Handler {
    Arc::new(|_: &str, params: &[Value]| Reply::Result(Value::Array(params.to_vec())))
}

struct ServerState {
    handler: Handler,
    handshake: HandshakeMode,
    next_uid: AtomicI64,
    accepted: AtomicUsize,
    methods: Mutex<Vec<String>>,
}

pub(crate) struct FakeServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl FakeServer {
    /// Server answering every RPC with its params.
    pub(crate) fn echo() -> Self {
        Self::start(HandshakeMode::Accept, echo_handler())
    }

    pub(crate) fn with_handshake(mode: HandshakeMode) -> Self {
        Self::start(mode, echo_handler())
    }

    pub(crate) fn with_handler(handler: Handler) -> Self {
        Self::start(HandshakeMode::Accept, handler)
    }

    fn start(handshake: HandshakeMode, handler: Handler) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(ServerState {
            handler,
            handshake,
            next_uid: AtomicI64::new(1),
            accepted: AtomicUsize::new(0),
            methods: Mutex::new(Vec::new()),
        });

        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let state = Arc::clone(&accept_state);
                thread::spawn(move || serve(stream, &state));
            }
        });

        Self { addr, state }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.state.methods.lock().clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> usize {
        self.state
            .methods
            .lock()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

fn serve(stream: TcpStream, state: &ServerState) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut writer = stream;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            return;
        };

        let out = if let Some(cmd) = message.get("cmd").and_then(Value::as_str) {
            match state.handshake {
                HandshakeMode::Accept => {
                    let uid = if cmd == "initiate" {
                        state.next_uid.fetch_add(1, Ordering::SeqCst)
                    } else {
                        message["uid"].as_i64().unwrap_or(-1)
                    };
                    json!({"status": true, "uid": uid}).to_string()
                }
                HandshakeMode::Reject => json!({"status": false, "uid": -1}).to_string(),
                HandshakeMode::Silent => continue,
                HandshakeMode::Hangup => return,
            }
        } else {
            let id = message["id"].clone();
            let method = message["method"].as_str().unwrap_or_default().to_string();
            let params = message["params"].as_array().cloned().unwrap_or_default();
            state.methods.lock().push(method.clone());

            match (state.handler)(&method, &params) {
                Reply::Result(result) => {
                    json!({"id": id, "result": result, "error": null}).to_string()
                }
                Reply::Error(error) => {
                    json!({"id": id, "result": null, "error": error}).to_string()
                }
                Reply::WrongId(result) => {
                    let wrong = id.as_u64().unwrap_or_default() + 1000;
                    json!({"id": wrong, "result": result, "error": null}).to_string()
                }
                Reply::Blank => String::new(),
                Reply::Silent => continue,
                Reply::Hangup => return,
                Reply::Reset => {
                    // Zero linger turns the close into an RST.
                    let _ = SockRef::from(&writer).set_linger(Some(Duration::ZERO));
                    return;
                }
            }
        };

        if writer.write_all(out.as_bytes()).is_err()
            || writer.write_all(b"\n").is_err()
            || writer.flush().is_err()
        {
            return;
        }
    }
}
