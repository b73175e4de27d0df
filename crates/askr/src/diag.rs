//! Diagnostics sender — ships live tree metrics to `askr-telemetry` over UDP.
//!
//! Enabled by the `diagnostics` feature flag. When a [`DiagSender`] resource
//! is in the tree, [`send_diagnostics`] is called once per tick by the
//! [`Engine`](crate::engine::Engine) and, throttled to the configured rate
//! (10 Hz by default), serializes a JSON snapshot and sends it to
//! `127.0.0.1:9100`.
//!
//! Datagrams are fire-and-forget: nothing listening is not an error.

use std::net::UdpSocket;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use log::Log;
use serde::Serialize;

use crate::config::DiagnosticsConfig;
use crate::engine::TickStats;
use crate::error::Result;
use crate::render::RenderingServer;
use crate::tree::{NodeId, SceneTree};

#[cfg(feature = "physics3d")]
use crate::physics::PhysicsServer;

/// Snapshots carry at most this many nodes.
const MAX_NODES: usize = 2000;
/// Captured log lines shipped per snapshot.
const LOGS_PER_SNAPSHOT: usize = 50;
const LOG_RING_CAPACITY: usize = 500;

// ── DiagSender ───────────────────────────────────────────────────────────

/// Resource that owns the outbound UDP socket and throttling state.
#[derive(Debug)]
pub struct DiagSender {
    socket: UdpSocket,
    interval: Duration,
    last_send: Option<Instant>,
    sent: u64,
}

impl DiagSender {
    /// Bind an ephemeral local port and aim it at `config.address`.
    pub fn new(config: &DiagnosticsConfig) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.connect(config.address.as_str())?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            interval: Duration::from_secs_f32(1.0 / config.send_rate_hz.max(0.001)),
            last_send: None,
            sent: 0,
        })
    }

    /// Snapshots sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn due(&self, now: Instant) -> bool {
        self.last_send
            .is_none_or(|last| now.duration_since(last) >= self.interval)
    }
}

// ── Snapshot types (wire format) ────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DiagSnapshot {
    fps: f32,
    delta_ms: f32,
    frame_count: u64,
    node_count: usize,
    slot_count: usize,
    body_count: usize,
    physics_steps: u32,
    draw_commands: usize,
    drawables: usize,
    frame_budget: FrameBudgetSnapshot,
    nodes: Vec<NodeInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    logs: Vec<LogEntrySnapshot>,
}

#[derive(Debug, Serialize)]
struct FrameBudgetSnapshot {
    update_us: f64,
    physics_us: f64,
    render_us: f64,
}

/// One node of the attached tree, depth-first.
#[derive(Debug, Serialize)]
struct NodeInfo {
    id: String,
    depth: usize,
    name: String,
    type_name: String,
    kind: &'static str,
    enabled: bool,
    children: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<[f32; 3]>,
}

#[derive(Debug, Serialize)]
struct LogEntrySnapshot {
    level: String,
    target: String,
    message: String,
    timestamp_secs: f32,
}

fn snapshot(tree: &SceneTree, stats: &TickStats, logs: Vec<LogEntrySnapshot>) -> DiagSnapshot {
    let delta = stats.delta.as_secs_f32();

    #[cfg(feature = "physics3d")]
    let body_count = tree.get_resource::<PhysicsServer>().map_or(0, PhysicsServer::body_count);
    #[cfg(not(feature = "physics3d"))]
    let body_count = 0;

    DiagSnapshot {
        fps: if delta > 0.0 { 1.0 / delta } else { 0.0 },
        delta_ms: delta * 1000.0,
        frame_count: stats.frame,
        node_count: tree.node_count(),
        slot_count: tree.slot_count(),
        body_count,
        physics_steps: stats.physics_steps,
        draw_commands: stats.draw_commands,
        drawables: tree
            .get_resource::<RenderingServer>()
            .map_or(0, RenderingServer::drawable_count),
        frame_budget: FrameBudgetSnapshot {
            update_us: stats.update_us,
            physics_us: stats.physics_us,
            render_us: stats.render_us,
        },
        nodes: tree.root().map(|root| node_infos(tree, root)).unwrap_or_default(),
        logs,
    }
}

fn node_infos(tree: &SceneTree, root: NodeId) -> Vec<NodeInfo> {
    let mut nodes = Vec::new();
    tree.walk(root, &mut |id, depth| {
        if nodes.len() >= MAX_NODES {
            return;
        }
        let (Ok(name), Ok(type_name), Ok(kind)) = (tree.name(id), tree.type_name(id), tree.kind(id)) else {
            return;
        };
        nodes.push(NodeInfo {
            id: id.to_string(),
            depth,
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: kind.as_str(),
            enabled: tree.is_enabled(id),
            children: tree.children(id).map_or(0, <[NodeId]>::len),
            translation: kind
                .is_spatial()
                .then(|| tree.global_translation(id).ok())
                .flatten()
                .map(|t| t.to_array()),
        });
    });
    nodes
}

// ── send_diagnostics ─────────────────────────────────────────────────────

/// Called once per tick. Throttled internally.
pub fn send_diagnostics(tree: &mut SceneTree, stats: &TickStats) {
    let Some(sender) = tree.get_resource::<DiagSender>() else {
        return;
    };
    let now = Instant::now();
    if !sender.due(now) {
        return;
    }

    let logs = drain_captured_logs(LOGS_PER_SNAPSHOT)
        .into_iter()
        .map(|entry| LogEntrySnapshot {
            level: entry.level.to_string(),
            target: entry.target,
            message: entry.message,
            timestamp_secs: entry.timestamp_secs,
        })
        .collect();
    let json = serde_json::to_vec(&snapshot(tree, stats, logs));

    let Some(sender) = tree.get_resource_mut::<DiagSender>() else {
        return;
    };
    sender.last_send = Some(now);
    match json {
        Ok(json) => {
            // Nobody listening shows up as a send error; that's fine.
            if sender.socket.send(&json).is_ok() {
                sender.sent += 1;
            }
        }
        Err(err) => log::debug!("diagnostics snapshot failed to serialize: {err}"),
    }
}

// ── Log Capture ──────────────────────────────────────────────────────────

/// A captured log message.
struct CapturedLog {
    level: log::Level,
    target: String,
    message: String,
    timestamp_secs: f32,
}

/// Ring buffer for captured logs.
struct LogRing {
    entries: std::collections::VecDeque<CapturedLog>,
    started: Instant,
}

impl LogRing {
    fn new() -> Self {
        Self {
            entries: std::collections::VecDeque::new(),
            started: Instant::now(),
        }
    }

    fn push(&mut self, entry: CapturedLog) {
        if self.entries.len() >= LOG_RING_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn drain(&mut self, max: usize) -> Vec<CapturedLog> {
        let n = self.entries.len().min(max);
        self.entries.drain(..n).collect()
    }
}

static LOG_RING: Mutex<Option<LogRing>> = Mutex::new(None);

/// Captures records into the ring buffer and delegates to env_logger for
/// stderr output.
struct DiagLogger {
    inner: env_logger::Logger,
}

impl log::Log for DiagLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata) || metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }
        if record.level() > log::Level::Info && !self.inner.enabled(record.metadata()) {
            return;
        }

        if let Ok(mut guard) = LOG_RING.lock() {
            if let Some(ring) = guard.as_mut() {
                let entry = CapturedLog {
                    level: record.level(),
                    target: record.target().to_string(),
                    message: record.args().to_string(),
                    timestamp_secs: ring.started.elapsed().as_secs_f32(),
                };
                ring.push(entry);
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

static DIAG_LOGGER: OnceLock<DiagLogger> = OnceLock::new();

/// Install the capturing logger. Info and above are always captured for
/// the telemetry panel; stderr output follows `RUST_LOG`.
///
/// Call this early (before any log messages) to capture everything. Calling
/// it again, or after another logger was installed, only warns.
pub fn init_logger() {
    if let Ok(mut ring) = LOG_RING.lock() {
        ring.get_or_insert_with(LogRing::new);
    }

    let inner = env_logger::Builder::new().parse_default_env().build();
    let max_level = inner.filter();
    let logger = DIAG_LOGGER.get_or_init(|| DiagLogger { inner });

    if log::set_logger(logger).is_err() {
        log::warn!("a logger is already installed; diagnostics log capture is off");
        return;
    }
    log::set_max_level(max_level.max(log::LevelFilter::Info));
}

fn drain_captured_logs(max: usize) -> Vec<CapturedLog> {
    let Ok(mut guard) = LOG_RING.lock() else {
        return Vec::new();
    };
    guard.as_mut().map(|ring| ring.drain(max)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeBuilder;

    fn listener() -> (UdpSocket, DiagnosticsConfig) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let config = DiagnosticsConfig {
            address: socket.local_addr().unwrap().to_string(),
            ..DiagnosticsConfig::default()
        };
        (socket, config)
    }

    fn small_tree() -> (SceneTree, NodeId) {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeBuilder::spatial().with_name("world"));
        let lamp = tree.spawn(
            NodeBuilder::spatial()
                .with_name("lamp")
                .with_translation(crate::math::Vec3::new(1.0, 2.0, 3.0)),
        );
        tree.queue_add_child(root, lamp).unwrap();
        tree.set_root(root).unwrap();
        tree.advance(root).unwrap();
        (tree, lamp)
    }

    #[test]
    fn snapshot_lists_the_attached_tree() {
        let (tree, lamp) = small_tree();
        let stats = TickStats {
            frame: 7,
            delta: Duration::from_millis(20),
            ..TickStats::default()
        };

        let snap = snapshot(&tree, &stats, Vec::new());
        assert_eq!(snap.frame_count, 7);
        assert!((snap.fps - 50.0).abs() < 0.01);
        assert_eq!(snap.node_count, 2);
        assert_eq!(snap.nodes.len(), 2);
        assert_eq!(snap.nodes[0].name, "world");
        assert_eq!(snap.nodes[0].children, 1);
        assert_eq!(snap.nodes[1].id, lamp.to_string());
        assert_eq!(snap.nodes[1].depth, 1);
        assert_eq!(snap.nodes[1].translation, Some([1.0, 2.0, 3.0]));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["nodes"][1]["kind"], "spatial");
        assert!(json.get("logs").is_none());
    }

    #[test]
    fn sends_are_throttled() {
        let (socket, config) = listener();
        let (mut tree, _) = small_tree();
        tree.insert_resource(DiagSender::new(&config).unwrap());

        let stats = TickStats::default();
        send_diagnostics(&mut tree, &stats);
        send_diagnostics(&mut tree, &stats);
        assert_eq!(tree.get_resource::<DiagSender>().unwrap().sent(), 1);

        let mut buf = [0u8; 65536];
        let n = socket.recv(&mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(json["node_count"], 2);
        assert_eq!(json["nodes"][0]["name"], "world");
    }

    #[test]
    fn ring_drops_the_oldest_entries() {
        let mut ring = LogRing::new();
        for i in 0..LOG_RING_CAPACITY + 5 {
            ring.push(CapturedLog {
                level: log::Level::Info,
                target: "askr".into(),
                message: i.to_string(),
                timestamp_secs: 0.0,
            });
        }
        let first = ring.drain(2);
        assert_eq!(first[0].message, "5");
        assert_eq!(first[1].message, "6");
        assert_eq!(ring.entries.len(), LOG_RING_CAPACITY - 2);
    }
}
