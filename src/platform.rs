use std::any::Any;

#[inline]
pub fn spawn<O, F>(future: F) -> tokio::task::JoinHandle<O>
where
    O: Send + 'static,
    F: std::future::Future<Output = O> + Send + 'static,
{
    tokio::spawn(future)
}

/// Runs blocking work off the async executor. A panic inside `f` is caught and returned as
/// its message.
pub async fn handle<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(output) => Ok(output),
        Err(err) => match err.try_into_panic() {
            Ok(payload) => Err(panic_message(payload)),
            Err(err) => Err(err.to_string()),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}
