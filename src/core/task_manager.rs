use anyhow::{Context, Result};

/// Spawn a short blocking job on the tokio blocking pool
pub fn spawn_blocking_task<F, R>(func: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
}

/// Spawn a long-lived worker on its own named OS thread
pub fn spawn_named_thread<F>(name: &str, func: F) -> Result<std::thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(func)
        .with_context(|| format!("Failed to spawn thread {name}"))
}
