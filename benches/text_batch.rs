//! Text batch and connection benchmark suite.
//!
//! Benchmarks framing and the send path at different scales:
//! - Batch sizes: 16, 256, 4096 records
//! - Payload mix: text and Base64 binary
//!
//! Run with: cargo bench --bench text_batch
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use sockets_client::client::StaticNegotiator;
use sockets_client::format::{decode_all, encode};
use sockets_client::transport::MemoryTransport;
use sockets_client::{Connection, Message};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[16, 256, 4096];
const SEND_COUNTS: &[usize] = &[100, 1000];

fn sample_messages(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            if i % 4 == 0 {
                Message::binary(vec![i as u8; 48])
            } else {
                Message::text(format!("message {i} with some chat payload"))
            }
        })
        .collect()
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &count in BATCH_SIZES {
        let batch = encode(&sample_messages(count));
        group.throughput(Throughput::Bytes(batch.len() as u64));
        group.bench_with_input(BenchmarkId::new("records", count), &batch, |b, batch| {
            b.iter(|| decode_all(batch).expect("valid batch"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for &count in BATCH_SIZES {
        let messages = sample_messages(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("records", count),
            &messages,
            |b, messages| {
                b.iter(|| encode(messages));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Send Path
// ============================================================================

fn bench_send(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    let mut group = c.benchmark_group("send");
    group.sample_size(20);

    for &count in SEND_COUNTS {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("messages", count), &count, |b, &count| {
            b.to_async(&rt).iter(|| send_messages(count));
        });
    }

    group.finish();
}

async fn send_messages(count: usize) {
    let transport = MemoryTransport::new();
    let connection = Connection::builder()
        .url("http://localhost/bench")
        .transport(transport.clone())
        .negotiator(StaticNegotiator::random())
        .connect()
        .await
        .expect("connect");

    for i in 0..count {
        connection
            .send(format!("payload {i}").into_bytes())
            .await
            .expect("send");
    }
    for _ in 0..count {
        transport.next_sent().await.expect("clean").expect("message");
    }

    connection.stop();
    connection.closed().await;
}

criterion_group!(benches, bench_decode, bench_encode, bench_send);
criterion_main!(benches);
