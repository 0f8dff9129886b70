use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::flow::key::FlowKey;
use crate::parse::packet::{TCP_FLAG_ACK, TCP_FLAG_FIN, TCP_FLAG_RST, TCP_FLAG_SYN};

/// Application category. A tagged variant with a stable, case-sensitive
/// string form (glossary), rather than the source's bare `str` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppType {
    Unknown,
    Http,
    Https,
    Dns,
    Tls,
    Quic,
    Google,
    Facebook,
    Youtube,
    Twitter,
    Instagram,
    Netflix,
    Amazon,
    Microsoft,
    Apple,
    Whatsapp,
    Telegram,
    Tiktok,
    Spotify,
    Zoom,
    Discord,
    Github,
    Cloudflare,
}

impl AppType {
    /// Parse the glossary's wire form back into a variant (used by the
    /// admin `/ingest` endpoint, whose JSON body carries `app_type` as a
    /// string). Unrecognized input maps to `Unknown` rather than erroring
    /// — classification is advisory, never a reason to reject a packet.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "HTTP" => AppType::Http,
            "HTTPS" => AppType::Https,
            "DNS" => AppType::Dns,
            "TLS" => AppType::Tls,
            "QUIC" => AppType::Quic,
            "GOOGLE" => AppType::Google,
            "FACEBOOK" => AppType::Facebook,
            "YOUTUBE" => AppType::Youtube,
            "TWITTER" => AppType::Twitter,
            "INSTAGRAM" => AppType::Instagram,
            "NETFLIX" => AppType::Netflix,
            "AMAZON" => AppType::Amazon,
            "MICROSOFT" => AppType::Microsoft,
            "APPLE" => AppType::Apple,
            "WHATSAPP" => AppType::Whatsapp,
            "TELEGRAM" => AppType::Telegram,
            "TIKTOK" => AppType::Tiktok,
            "SPOTIFY" => AppType::Spotify,
            "ZOOM" => AppType::Zoom,
            "DISCORD" => AppType::Discord,
            "GITHUB" => AppType::Github,
            "CLOUDFLARE" => AppType::Cloudflare,
            _ => AppType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Unknown => "UNKNOWN",
            AppType::Http => "HTTP",
            AppType::Https => "HTTPS",
            AppType::Dns => "DNS",
            AppType::Tls => "TLS",
            AppType::Quic => "QUIC",
            AppType::Google => "GOOGLE",
            AppType::Facebook => "FACEBOOK",
            AppType::Youtube => "YOUTUBE",
            AppType::Twitter => "TWITTER",
            AppType::Instagram => "INSTAGRAM",
            AppType::Netflix => "NETFLIX",
            AppType::Amazon => "AMAZON",
            AppType::Microsoft => "MICROSOFT",
            AppType::Apple => "APPLE",
            AppType::Whatsapp => "WHATSAPP",
            AppType::Telegram => "TELEGRAM",
            AppType::Tiktok => "TIKTOK",
            AppType::Spotify => "SPOTIFY",
            AppType::Zoom => "ZOOM",
            AppType::Discord => "DISCORD",
            AppType::Github => "GITHUB",
            AppType::Cloudflare => "CLOUDFLARE",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for AppType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Overall flow lifecycle state (spec.md §3). `Blocked` never reverts to
/// `Classified`/`New`; `Closed` flows are removed from the table in the
/// same critical section that set this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    New,
    Classified,
    Blocked,
    Closed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::New => "NEW",
            FlowState::Classified => "CLASSIFIED",
            FlowState::Blocked => "BLOCKED",
            FlowState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for FlowState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// TCP connection sub-state, tracked independently of `FlowState` (spec.md
/// §9 Open Question: `update_tcp_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpSubState {
    New,
    SynSent,
    Established,
    Closed,
}

impl TcpSubState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TcpSubState::New => "NEW",
            TcpSubState::SynSent => "SYN_SENT",
            TcpSubState::Established => "ESTABLISHED",
            TcpSubState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for TcpSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for TcpSubState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl TcpSubState {
    /// RST/FIN always close; SYN opens a handshake; ACK during a pending
    /// handshake completes it. Any other flag combination leaves the
    /// sub-state unchanged (spec.md §4.7 step 3).
    pub fn advance(self, flags: u8) -> Self {
        if flags & TCP_FLAG_RST != 0 {
            TcpSubState::Closed
        } else if flags & TCP_FLAG_FIN != 0 {
            TcpSubState::Closed
        } else if flags & TCP_FLAG_SYN != 0 {
            TcpSubState::SynSent
        } else if flags & TCP_FLAG_ACK != 0 && self == TcpSubState::SynSent {
            TcpSubState::Established
        } else {
            self
        }
    }
}

/// A single flow (connection) record. The key is immutable; every other
/// field is mutated only through `FlowTable`'s guarded operations.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FlowRecord {
    pub key: FlowKey,
    pub state: FlowState,
    pub app_type: AppType,
    pub domain: Option<String>,
    pub first_seen: u64,
    pub last_seen: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub tcp_state: Option<TcpSubState>,
}

impl FlowRecord {
    pub fn new(key: FlowKey, now: u64) -> Self {
        let tcp_state = match key.protocol {
            crate::flow::key::Protocol::Tcp => Some(TcpSubState::New),
            _ => None,
        };
        Self {
            key,
            state: FlowState::New,
            app_type: AppType::Unknown,
            domain: None,
            first_seen: now,
            last_seen: now,
            packets_in: 0,
            packets_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            tcp_state,
        }
    }

    pub fn total_packets(&self) -> u64 {
        self.packets_in + self.packets_out
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_in + self.bytes_out
    }
}

/// Current wall-clock time in whole seconds since the epoch, used as the
/// flow table's `now` for `last_seen`/`first_seen` and staleness reaping.
pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
