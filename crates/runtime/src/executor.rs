use futures::executor::LocalSpawner;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawnExt, SpawnError};

/// Drives detached local futures on the current thread's event loop.
///
/// Loads are started from synchronous code and must run to completion even
/// when nobody awaits their promise. A refused task is dropped unpolled.
pub trait LocalExecutor {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError>;
}

impl LocalExecutor for LocalSpawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError> {
        LocalSpawnExt::spawn_local(self, task)
    }
}
