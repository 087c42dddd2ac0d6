use connwrap::{
    wrap, wrap_with, Close, DeferredClose, ForceClose, ForceCloseHandler, ReturnToQueue,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Connection {
    closed: AtomicBool,
}

impl Connection {
    fn query(&self, sql: &str) -> Option<String> {
        (!self.closed.load(Ordering::SeqCst)).then(|| format!("result of {}", sql))
    }
}

impl Close for Connection {
    type Error = std::convert::Infallible;

    fn close(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn main() {
    let idle = Arc::new(ReturnToQueue::with_capacity(1));

    // closing the handle returns the connection to the idle queue instead.
    let conn = wrap(Arc::new(Connection::default()), idle.clone());
    dbg!(conn.query("SELECT 1")); // Some; forwarded to the connection.
    conn.close().unwrap();
    dbg!(idle.queue().len()); // 1

    // the connection is still open and can be wrapped again.
    let raw = idle.queue().pop().unwrap();
    dbg!(raw.query("SELECT 2")); // Some

    // postpone closing until the unit of work is done, but keep a way out.
    let deferred = Arc::new(DeferredClose::new());
    let handler = ForceCloseHandler::shared(raw.clone());
    let conn = wrap_with(raw, handler, deferred.clone()).unwrap();
    conn.close().unwrap();
    dbg!(conn.query("SELECT 3")); // Some; close was deferred.
    dbg!(conn.force_close()); // Ok(()); closed for real, bypassing the deferral.
    dbg!(conn.query("SELECT 4")); // None
    dbg!(deferred.release_all().unwrap()); // 1; still recorded, closing again is harmless.

    let another = wrap(Arc::new(Connection::default()), Arc::new(connwrap::CloseResource));
    dbg!(another == another.clone()); // true; same handle.
    another.close().unwrap(); // CloseResource closes for real.
    dbg!(another.query("SELECT 5")); // None
}
