use kestrel::clock::SystemClock;
use kestrel::server::{ServerState, run_server};
use kestrel::store::Store;
use redis::Commands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn get_client(port: u16) -> redis::Connection {
    let client = redis::Client::open(format!("redis://127.0.0.1:{port}/")).unwrap();
    for i in 0..50 {
        match client.get_connection() {
            Ok(conn) => return conn,
            Err(_) if i < 49 => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => panic!("Failed to connect: {e}"),
        }
    }
    unreachable!()
}

fn bench_set_get(conn: &mut redis::Connection, iterations: usize) -> (f64, f64) {
    let start = Instant::now();
    for i in 0..iterations {
        let _: () = conn.set(format!("bench_key_{i}"), format!("value_{i}")).unwrap();
    }
    let set_ops = iterations as f64 / start.elapsed().as_secs_f64();

    let start = Instant::now();
    for i in 0..iterations {
        let _: String = conn.get(format!("bench_key_{i}")).unwrap();
    }
    let get_ops = iterations as f64 / start.elapsed().as_secs_f64();

    (set_ops, get_ops)
}

fn bench_incr(conn: &mut redis::Connection, iterations: usize) -> f64 {
    let _: () = conn.set("bench_counter", "0").unwrap();
    let start = Instant::now();
    for _ in 0..iterations {
        let _: i64 = conn.incr("bench_counter", 1).unwrap();
    }
    iterations as f64 / start.elapsed().as_secs_f64()
}

fn bench_zadd(conn: &mut redis::Connection, iterations: usize) -> f64 {
    let start = Instant::now();
    for i in 0..iterations {
        let _: i64 = conn.zadd("bench_zset", format!("m{i}"), i as f64).unwrap();
    }
    iterations as f64 / start.elapsed().as_secs_f64()
}

#[tokio::main]
async fn main() {
    let port = 17399;
    let iterations = 10_000;

    let store = Arc::new(Mutex::new(Store::new(Arc::new(SystemClock))));
    let state = Arc::new(ServerState::new(store, None));
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await.unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(run_server(listener, state, shutdown.clone()));

    let (set_ops, get_ops, incr_ops, zadd_ops) = tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let (set_ops, get_ops) = bench_set_get(&mut conn, iterations);
        let incr_ops = bench_incr(&mut conn, iterations);
        let zadd_ops = bench_zadd(&mut conn, iterations);
        (set_ops, get_ops, incr_ops, zadd_ops)
    })
    .await
    .unwrap();

    println!("Kestrel throughput ({iterations} ops each, single client):");
    println!("  SET:  {set_ops:>10.0} ops/sec");
    println!("  GET:  {get_ops:>10.0} ops/sec");
    println!("  INCR: {incr_ops:>10.0} ops/sec");
    println!("  ZADD: {zadd_ops:>10.0} ops/sec");

    shutdown.cancel();
    let _ = server.await;
}
