use connwrap::{
    capability, wrap, wrap_with, Close, CloseResource, ConfigurationError, NoOpCloseHandler,
    Wrapped,
};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::convert::Infallible;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

capability! {
    trait Ping {
        fn ping(&self) -> String;
    }
}

capability! {
    trait Tag {
        fn tag(&self, key: &str, value: u32) -> Result<String, DbError>;
    }
}

capability! {
    trait Detach {
        fn close(&self) -> Result<(), Infallible>;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum DbError {
    #[error("connection is closed")]
    Closed,

    #[error("syntax error: {0}")]
    Syntax(String),
}

#[derive(Debug, Default)]
struct Connection {
    id: u64,
    closed: AtomicBool,
    closes: AtomicUsize,
    pings: AtomicUsize,
}

impl Connection {
    fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            ..Default::default()
        })
    }

    fn query(&self, sql: &str) -> Result<String, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        if sql.is_empty() {
            return Err(DbError::Syntax("empty statement".to_owned()));
        }
        Ok(format!("{}: {}", self.id, sql))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Close for Connection {
    type Error = DbError;

    fn close(&self) -> Result<(), Self::Error> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        Ok(())
    }
}

impl Ping for Connection {
    fn ping(&self) -> String {
        self.pings.fetch_add(1, Ordering::SeqCst);
        "resource".to_owned()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

struct Pong;

impl Ping for Pong {
    fn ping(&self) -> String {
        "pong".to_owned()
    }
}

struct Tagger;

impl Tag for Tagger {
    fn tag(&self, key: &str, value: u32) -> Result<String, DbError> {
        if key.is_empty() {
            return Err(DbError::Syntax("empty key".to_owned()));
        }
        Ok(format!("{}={}", key, value))
    }
}

#[derive(Default)]
struct Detacher {
    detaches: AtomicUsize,
}

impl Detach for Detacher {
    fn close(&self) -> Result<(), Infallible> {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn pong() -> Arc<dyn Ping + Send + Sync> {
    Arc::new(Pong)
}

#[test]
fn equality_is_handle_identity() {
    let conn = Connection::new(1);
    let a = wrap(conn.clone(), Arc::new(NoOpCloseHandler));
    let b = wrap(conn.clone(), Arc::new(NoOpCloseHandler));

    assert_eq!(a, a);
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert!(Wrapped::equals(&a, &a));
    assert!(!Wrapped::equals(&a, &b));
    assert!(!Wrapped::equals(&a, &conn));
    assert!(!Wrapped::equals(&a, &*conn));
}

#[test]
fn hash_is_the_resource_hash() {
    let conn = Connection::new(7);
    let plain = wrap(conn.clone(), Arc::new(NoOpCloseHandler));
    let closing = wrap(conn.clone(), Arc::new(CloseResource));
    let augmented = wrap_with(conn.clone(), pong(), Arc::new(NoOpCloseHandler)).unwrap();

    assert_eq!(hash_of(&plain), hash_of(&*conn));
    assert_eq!(hash_of(&closing), hash_of(&*conn));
    assert_eq!(hash_of(&augmented), hash_of(&*conn));
}

#[test]
fn wraps_of_one_resource_share_a_bucket_but_not_an_entry() {
    let conn = Connection::new(3);
    let a = wrap(conn.clone(), Arc::new(NoOpCloseHandler));
    let b = wrap(conn, Arc::new(NoOpCloseHandler));

    let mut set = HashSet::new();
    assert!(set.insert(a.clone()));
    assert!(set.insert(b.clone()));
    assert!(!set.insert(a.clone()));
    assert_eq!(set.len(), 2);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn fixed_hash_resource_is_not_equal_to_its_wrap() {
    #[derive(Debug)]
    struct Answer;

    impl Hash for Answer {
        fn hash<H: Hasher>(&self, state: &mut H) {
            42u64.hash(state);
        }
    }

    let answer = Arc::new(Answer);
    let wrapped = wrap(answer.clone(), Arc::new(NoOpCloseHandler));

    assert_eq!(hash_of(&wrapped), hash_of(&42u64));
    assert!(!Wrapped::equals(&wrapped, &*answer));
}

#[test]
fn close_goes_to_the_handler_with_the_resource() {
    let conn = Connection::new(1);
    let seen = Arc::new(Mutex::new(Vec::<Arc<Connection>>::new()));
    let recorder = {
        let seen = seen.clone();
        move |resource: &Arc<Connection>| -> Result<(), Infallible> {
            seen.lock().push(resource.clone());
            Ok(())
        }
    };
    let wrapped = wrap(conn.clone(), Arc::new(recorder));

    wrapped.close().unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(Arc::ptr_eq(&seen[0], &conn));
    assert_eq!(conn.closes.load(Ordering::SeqCst), 0);
    assert!(!conn.is_closed());
}

#[test]
fn noop_close_leaves_the_resource_usable() {
    let conn = Connection::new(2);
    let wrapped = wrap(conn.clone(), Arc::new(NoOpCloseHandler));

    wrapped.close().unwrap();

    assert!(!conn.is_closed());
    assert_eq!(wrapped.query("SELECT 1").unwrap(), "2: SELECT 1");
}

#[test]
fn close_through_the_close_trait_is_redirected_too() {
    fn shut<T: Close>(resource: &T) -> Result<(), T::Error> {
        resource.close()
    }

    let conn = Connection::new(1);
    let wrapped = wrap(conn.clone(), Arc::new(NoOpCloseHandler));

    shut(&wrapped).unwrap();

    assert_eq!(conn.closes.load(Ordering::SeqCst), 0);
}

#[test]
fn every_close_reaches_the_handler() {
    let conn = Connection::new(1);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = {
        let count = count.clone();
        move |_: &Arc<Connection>| -> Result<(), Infallible> {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };
    let wrapped = wrap(conn, Arc::new(counter));

    wrapped.close().unwrap();
    wrapped.close().unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn close_handler_failure_reaches_the_caller() {
    let conn = Connection::new(1);
    let failing = |_: &Arc<Connection>| -> Result<(), DbError> {
        Err(DbError::Syntax("no close for you".to_owned()))
    };
    let wrapped = wrap(conn, Arc::new(failing));

    assert_eq!(
        wrapped.close(),
        Err(DbError::Syntax("no close for you".to_owned()))
    );
}

#[test]
fn real_close_then_forwarding_fails_like_the_resource() {
    let conn = Connection::new(4);
    let wrapped = wrap(conn.clone(), Arc::new(CloseResource));

    wrapped.close().unwrap();
    assert!(conn.is_closed());
    assert_eq!(wrapped.query("SELECT 1"), Err(DbError::Closed));

    assert_eq!(wrapped.close(), Err(DbError::Closed));
    assert_eq!(conn.closes.load(Ordering::SeqCst), 2);
}

#[test]
fn other_calls_forward_unchanged() {
    let conn = Connection::new(5);
    let wrapped = wrap(conn.clone(), Arc::new(NoOpCloseHandler));

    assert_eq!(wrapped.query("SELECT 1"), conn.query("SELECT 1"));
    assert_eq!(wrapped.query(""), conn.query(""));
    assert_eq!(
        wrapped.query(""),
        Err(DbError::Syntax("empty statement".to_owned()))
    );
    assert_eq!(wrapped.is_closed(), conn.is_closed());
}

#[test]
fn capability_is_served_by_the_handler() {
    let conn = Connection::new(1);
    let wrapped = wrap_with(conn.clone(), pong(), Arc::new(NoOpCloseHandler)).unwrap();

    assert_eq!(wrapped.ping(), "pong");
    assert_eq!(conn.pings.load(Ordering::SeqCst), 0);
}

#[test]
fn capability_close_outranks_the_close_handler() {
    let conn = Connection::new(1);
    let detacher = Arc::new(Detacher::default());
    let closes = Arc::new(AtomicUsize::new(0));
    let close_handler = {
        let closes = closes.clone();
        move |_: &Arc<Connection>| -> Result<(), Infallible> {
            closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    };
    let handler: Arc<dyn Detach + Send + Sync> = detacher.clone();
    let wrapped = wrap_with(conn.clone(), handler, Arc::new(close_handler)).unwrap();

    wrapped.close().unwrap();
    Close::close(&wrapped).unwrap();
    Detach::close(&wrapped).unwrap();

    assert_eq!(detacher.detaches.load(Ordering::SeqCst), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 0);
    assert_eq!(wrapped.query("SELECT 1"), Ok("1: SELECT 1".to_owned()));
}

#[test]
fn without_capability_the_resource_method_is_reached() {
    let conn = Connection::new(1);
    let wrapped = wrap(conn.clone(), Arc::new(NoOpCloseHandler));

    assert_eq!(wrapped.ping(), "resource");
    assert_eq!(conn.pings.load(Ordering::SeqCst), 1);
}

#[test]
fn capability_arguments_and_failures_pass_through() {
    let handler: Arc<dyn Tag + Send + Sync> = Arc::new(Tagger);
    let wrapped = wrap_with(Connection::new(1), handler, Arc::new(NoOpCloseHandler)).unwrap();

    assert_eq!(wrapped.tag("pool", 3).unwrap(), "pool=3");
    assert_eq!(
        wrapped.tag("", 3),
        Err(DbError::Syntax("empty key".to_owned()))
    );
    assert_eq!(wrapped.query("SELECT 1").unwrap(), "1: SELECT 1");
}

#[test]
fn capability_equal_to_the_resource_type_is_rejected() {
    let resource = pong();
    let result = wrap_with(resource, pong(), Arc::new(NoOpCloseHandler));

    assert_eq!(
        result.err(),
        Some(ConfigurationError::AmbiguousCapability { capability: "Ping" })
    );
}

#[test]
fn handler_accessors_expose_the_collaborators() {
    let conn = Connection::new(9);
    let close_handler = Arc::new(NoOpCloseHandler);
    let wrapped = wrap_with(conn.clone(), pong(), close_handler.clone()).unwrap();

    assert!(Arc::ptr_eq(Wrapped::resource(&wrapped), &conn));
    assert!(Arc::ptr_eq(Wrapped::close_handler(&wrapped), &close_handler));
    assert_eq!(Wrapped::handler(&wrapped).ping(), "pong");
}
