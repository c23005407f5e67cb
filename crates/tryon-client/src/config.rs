//! Client settings, parsed from the command line with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use tryon_shared::constants::{APP_NAME, LIST_TIMEOUT_SECS};

const IDENTITY_FILE: &str = "user_id";

#[derive(Debug, Clone, Args)]
pub struct ClientConfig {
    /// Base URL of the try-on server.
    #[arg(
        long,
        env = "TRYON_SERVER_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    pub server_url: String,

    /// File holding this client's user id. Defaults to the platform data
    /// directory.
    #[arg(long, env = "TRYON_IDENTITY_FILE", global = true)]
    pub identity_file: Option<PathBuf>,

    #[arg(long, default_value_t = LIST_TIMEOUT_SECS, global = true)]
    pub list_timeout_secs: u64,

    #[arg(long, default_value_t = 600, global = true)]
    pub generate_timeout_secs: u64,
}

impl ClientConfig {
    pub fn identity_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.identity_file {
            return Some(path.clone());
        }
        directories::ProjectDirs::from("ai", APP_NAME, APP_NAME)
            .map(|dirs| dirs.data_dir().join(IDENTITY_FILE))
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ClientConfig,
    }

    #[test]
    fn test_explicit_identity_file_wins() {
        let cli = TestCli::parse_from([
            "tryon",
            "--identity-file",
            "/tmp/tryon-id",
            "--list-timeout-secs",
            "2",
        ]);
        assert_eq!(cli.config.identity_path(), Some(PathBuf::from("/tmp/tryon-id")));
        assert_eq!(cli.config.list_timeout(), Duration::from_secs(2));
        assert_eq!(cli.config.generate_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_identity_provisioned_once_at_configured_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("profile").join("user_id");
        let cli = TestCli::parse_from([
            "tryon",
            "--identity-file",
            file.to_str().unwrap(),
        ]);

        let path = cli.config.identity_path().unwrap();
        let first = tryon_shared::identity::provision(&path).unwrap();
        let second = tryon_shared::identity::provision(&path).unwrap();

        assert_eq!(first, second);
        assert!(file.exists());
    }
}
