//! Server configuration

use mixbox_protocol::{DEFAULT_BLOCK_SIZE, DEFAULT_SECRET_SIZE};

/// Configuration for one cluster node. The server list is identical on
/// every node; a server's index in it is its cascade position.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the RPC listener
    pub bind_addr: String,

    /// Listener port
    pub port: u16,

    /// This server's index in `servers`
    pub id: usize,

    /// Ordered `host:port` addresses of every server, cascade order
    pub servers: Vec<String>,

    /// Expected number of clients; reaching it releases the barrier
    pub num_clients: usize,

    /// Payload block length in bytes
    pub block_size: usize,

    /// Length of the pre-exchange mask/secret slots in bytes
    pub secret_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            id: 0,
            servers: vec!["127.0.0.1:8080".to_string()],
            num_clients: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            secret_size: DEFAULT_SECRET_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MIXBOX_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(port) = std::env::var("MIXBOX_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(id) = std::env::var("MIXBOX_SERVER_ID") {
            if let Ok(i) = id.parse() {
                config.id = i;
            }
        }
        if let Ok(servers) = std::env::var("MIXBOX_SERVERS") {
            config.servers = servers.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(num) = std::env::var("MIXBOX_NUM_CLIENTS") {
            if let Ok(n) = num.parse() {
                config.num_clients = n;
            }
        }
        if let Ok(size) = std::env::var("MIXBOX_BLOCK_SIZE") {
            if let Ok(s) = size.parse() {
                config.block_size = s;
            }
        }
        if let Ok(size) = std::env::var("MIXBOX_SECRET_SIZE") {
            if let Ok(s) = size.parse() {
                config.secret_size = s;
            }
        }

        config
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn num_servers(&self) -> usize {
        self.servers.len()
    }

    /// First hop of the cascade collects the upload intake.
    pub fn is_first_hop(&self) -> bool {
        self.id == 0
    }

    /// Last hop of the cascade publishes plaintexts.
    pub fn is_last_hop(&self) -> bool {
        self.id == self.num_servers() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_position() {
        let config = ServerConfig {
            id: 1,
            servers: vec!["a:1".into(), "b:2".into(), "c:3".into()],
            ..Default::default()
        };
        assert!(!config.is_first_hop());
        assert!(!config.is_last_hop());
        assert_eq!(config.num_servers(), 3);

        let single = ServerConfig::default();
        assert!(single.is_first_hop() && single.is_last_hop());
    }
}
