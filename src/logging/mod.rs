use std::{
    io::{self, Write},
    path::Path,
    str::FromStr,
};

use env_logger::Builder;
use log::LevelFilter;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch,
    },
};

use crate::{config, core::ImageResult};

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender.send(data).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `log` records into a file through a background tokio task, so
/// logging from the admission path never blocks on disk.
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    fn level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.config.level).unwrap_or(LevelFilter::Info)
    }

    /// Install the global logger. `RUST_LOG` still refines the configured level.
    pub fn init_env_logger(&self) -> ImageResult<()> {
        let writer = self.create_async_writer();
        Builder::new()
            .filter_level(self.level())
            .parse_env(env_logger::Env::default())
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .try_init()
            .map_err(|e| crate::config_error!("Failed to install logger: {}", e))
    }

    /// Drain buffered records into the log file until `shutdown` flips to
    /// `true` or every writer is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ImageResult<()> {
        let log_file_path = Path::new(&self.config.path);

        if let Some(parent) = log_file_path.parent() {
            if !parent.as_os_str().is_empty() && metadata(parent).await.is_err() {
                create_dir_all(parent).await?;
            }
        }

        let mut file = BufWriter::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_file_path)
                .await?,
        );

        // Our own sender must not keep the channel open.
        drop(self.sender);

        loop {
            tokio::select! {
                biased;
                // Shutdown signal handling
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("Shutdown signal received, stopping write log");
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                log::error!("Failed to write to log file: {}", e);
                            }
                        }
                        None => {
                            log::info!("Log channel closed, stopping write log");
                            break;
                        }
                    }
                }
            }
        }

        // Flush what was queued before shutdown.
        while let Ok(data) = self.receiver.try_recv() {
            file.write_all(&data).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_config(path: &Path) -> config::Log {
        config::Log {
            path: path.to_string_lossy().into_owned(),
            level: "debug".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_reach_file() {
        let dir = std::env::temp_dir().join(format!("pixsix-log-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("pixsix.log");

        let logger = Logger::new(log_config(&path));
        let mut writer = logger.create_async_writer();
        writer.write_all(b"first line\n").unwrap();
        writer.write_all(b"second line\n").unwrap();
        drop(writer);

        let (_tx, rx) = watch::channel(false);
        logger.run(rx).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "first line\nsecond line\n");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let path = std::env::temp_dir().join(format!("pixsix-{}.log", uuid::Uuid::new_v4()));

        let logger = Logger::new(log_config(&path));
        let mut writer = logger.create_async_writer();
        writer.write_all(b"queued\n").unwrap();

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        logger.run(rx).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "queued\n");
        // The file task is gone, later writes fail instead of blocking.
        assert!(writer.write_all(b"late\n").is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_level_falls_back_to_info() {
        let logger = Logger::new(config::Log {
            path: "pixsix.log".to_string(),
            level: "verbose".to_string(),
        });
        assert_eq!(logger.level(), LevelFilter::Info);
    }
}
