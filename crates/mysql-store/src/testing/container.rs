//! Docker container management for MySQL testing

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mysql_async::prelude::*;
use tracing::{debug, info};

use crate::MySqlEndpoint;

const ROOT_PASSWORD: &str = "testpass";

/// Directory the server may export to and load from. It only exists inside
/// the container, so source and target must both live on the same server.
pub const SERVER_DUMP_DIR: &str = "/var/lib/mysql-files";

/// A throwaway `mysql:8.0` server.
pub struct MySQLContainer {
    pub container_name: String,
    pub host_port: u16,
    pub image_name: String,
}

impl MySQLContainer {
    pub fn new(container_name: &str, host_port: u16) -> Self {
        Self {
            container_name: container_name.to_string(),
            host_port,
            image_name: "mysql:8.0".to_string(),
        }
    }

    /// Endpoint for `database` as the root user.
    pub fn endpoint(&self, database: &str) -> MySqlEndpoint {
        MySqlEndpoint {
            host: "127.0.0.1".to_string(),
            port: self.host_port,
            user: "root".to_string(),
            password: ROOT_PASSWORD.to_string(),
            database: database.to_string(),
        }
    }

    /// Starts the container, replacing any leftover one with the same name.
    pub fn start(&self) -> Result<()> {
        info!("Starting MySQL container: {}", self.container_name);
        self.remove_quietly();

        let output = Command::new("docker")
            .args([
                "run",
                "--name",
                &self.container_name,
                "-e",
                &format!("MYSQL_ROOT_PASSWORD={ROOT_PASSWORD}"),
                "-e",
                "MYSQL_DATABASE=testdb",
                "-p",
                &format!("{}:3306", self.host_port),
                "-d",
                &self.image_name,
                &format!("--secure-file-priv={SERVER_DUMP_DIR}"),
            ])
            .output()
            .context("Failed to start Docker container")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to start container: {stderr}");
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Started container: {}", container_id);
        Ok(())
    }

    /// Polls until the server accepts connections.
    pub async fn wait_until_ready(&self, timeout_secs: u64) -> Result<()> {
        info!("Waiting for MySQL to be ready...");
        let start = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        while start.elapsed() < timeout {
            match self.execute("testdb", "SELECT 1").await {
                Ok(()) => {
                    info!("MySQL is ready!");
                    return Ok(());
                }
                Err(e) => {
                    debug!("Connection attempt failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            }
        }

        anyhow::bail!("MySQL did not become ready within {timeout_secs} seconds")
    }

    /// Drops and recreates `database`.
    pub async fn reset_database(&self, database: &str) -> Result<()> {
        self.execute("testdb", &format!("DROP DATABASE IF EXISTS `{database}`"))
            .await?;
        self.execute("testdb", &format!("CREATE DATABASE `{database}`"))
            .await
    }

    /// Runs one statement against `database` on a short-lived connection.
    pub async fn execute(&self, database: &str, statement: &str) -> Result<()> {
        let pool = mysql_async::Pool::new(self.endpoint(database).opts());
        let mut conn = pool.get_conn().await.context("Failed to get connection")?;
        conn.query_drop(statement)
            .await
            .with_context(|| format!("Failed to execute: {statement}"))?;
        drop(conn);
        pool.disconnect()
            .await
            .context("Failed to disconnect pool")?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        info!("Stopping container: {}", self.container_name);
        for action in ["stop", "rm"] {
            let output = Command::new("docker")
                .args([action, &self.container_name])
                .output()
                .with_context(|| format!("Failed to {action} container"))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                debug!("Failed to {} container (may not exist): {}", action, stderr);
            }
        }
        info!("Container stopped and removed");
        Ok(())
    }

    fn remove_quietly(&self) {
        for action in ["stop", "rm"] {
            let _ = Command::new("docker")
                .args([action, &self.container_name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

impl Drop for MySQLContainer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
