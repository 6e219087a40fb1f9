//! Configuration surface (spec §6), modeled as fluent builders over private
//! fields with documented defaults, the same shape the teacher uses for
//! `server::conn::http1::Builder` / `http2::Builder`.

use std::time::Duration;

/// Client certificate requirements for a TLS listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClientAuth {
    #[default]
    None,
    Requested,
    Required,
}

/// TLS-specific configuration.
#[derive(Clone, Debug, Default)]
pub struct TlsConfig {
    pub key_store: Option<String>,
    pub key_store_type: Option<String>,
    pub key_store_password: Option<String>,
    pub key_alias: Option<String>,
    pub key_alias_password: Option<String>,
    pub client_auth: ClientAuth,
    pub trust_store: Option<String>,
    pub cipher_includes: Vec<String>,
    pub cipher_excludes: Vec<String>,
    pub handshake_timeout: Duration,
}

impl TlsConfig {
    pub fn new() -> Self {
        TlsConfig {
            handshake_timeout: Duration::from_millis(10_000),
            ..Default::default()
        }
    }
}

/// HTTP/2-specific settings (RFC 7540 §6.5 SETTINGS, plus server knobs).
#[derive(Clone, Copy, Debug)]
pub struct Http2Config {
    pub header_table_size: u32,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Default for Http2Config {
    fn default() -> Self {
        Http2Config {
            header_table_size: 4096,
            max_concurrent_streams: 100,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: u32::MAX,
        }
    }
}

/// Content compression / decompression settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompressionConfig {
    pub compression_enabled: bool,
    pub decompression_enabled: bool,
    pub content_size_threshold: usize,
    pub deflate_level: u32,
    pub gzip_level: u32,
    pub zstd_level: i32,
}

/// WebSocket subsystem settings.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketConfig {
    pub handshake_timeout: Duration,
    pub close_timeout: Duration,
    pub max_frame_size: usize,
    pub allow_mask_mismatch: bool,
    pub frame_compression_enabled: bool,
    pub message_compression_enabled: bool,
    pub close_on_outbound_complete: bool,
    pub inbound_close_frame_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            handshake_timeout: Duration::from_millis(10_000),
            close_timeout: Duration::from_millis(5_000),
            max_frame_size: 65536,
            allow_mask_mismatch: false,
            frame_compression_enabled: false,
            message_compression_enabled: false,
            close_on_outbound_complete: true,
            inbound_close_frame_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Top-level server configuration, binding every option enumerated in the
/// design's external-interfaces section.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub server_event_loop_group_size: Option<usize>,

    pub tls_enabled: bool,
    pub tls: TlsConfig,

    pub h2_enabled: bool,
    pub h2c_enabled: bool,
    pub h2c_max_content_length: usize,
    pub http2: Http2Config,

    pub compression: CompressionConfig,
    pub websocket: WebSocketConfig,

    pub graceful_shutdown: bool,
    pub graceful_shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_owned(),
            server_port: 8080,
            server_event_loop_group_size: None,
            tls_enabled: false,
            tls: TlsConfig::new(),
            h2_enabled: true,
            h2c_enabled: false,
            h2c_max_content_length: 8192,
            http2: Http2Config::default(),
            compression: CompressionConfig::default(),
            websocket: WebSocketConfig::default(),
            graceful_shutdown: false,
            graceful_shutdown_timeout: Duration::from_millis(30_000),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_host(mut self, host: impl Into<String>) -> Self {
        self.server_host = host.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    pub fn tls_enabled(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }

    pub fn h2c_enabled(mut self, enabled: bool) -> Self {
        self.h2c_enabled = enabled;
        self
    }

    pub fn graceful_shutdown(mut self, enabled: bool) -> Self {
        self.graceful_shutdown = enabled;
        self
    }

    pub fn graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.server_host, "0.0.0.0");
        assert_eq!(cfg.server_port, 8080);
        assert!(cfg.h2_enabled);
        assert!(!cfg.h2c_enabled);
        assert_eq!(cfg.h2c_max_content_length, 8192);
        assert_eq!(cfg.http2.header_table_size, 4096);
        assert_eq!(cfg.http2.max_concurrent_streams, 100);
        assert_eq!(cfg.http2.initial_window_size, 65535);
        assert_eq!(cfg.http2.max_frame_size, 16384);
        assert_eq!(cfg.graceful_shutdown_timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.websocket.max_frame_size, 65536);
    }
}
