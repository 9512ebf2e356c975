//! Memory Operation Benchmarks
//!
//! Measures submission and execution throughput of the three primitives
//! and the scheduling overhead of dependency chains.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memq_core::CommandQueue;
use memq_device::HostDevice;
use std::sync::Arc;

fn benchmark_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill");

    for size in [1024usize, 65_536, 1_048_576].iter() {
        group.throughput(Throughput::Bytes((*size * 4) as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |bencher, &size| {
            let queue = CommandQueue::new(Arc::new(HostDevice::new()));
            let buffer = queue.allocate::<i32>(size).unwrap();

            bencher.iter(|| {
                let event = queue.fill(&buffer, 42i32, size, &[]).unwrap();
                queue.wait_all(&[event]).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_byte_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_set");

    for size in [4096usize, 262_144, 4_194_304].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |bencher, &size| {
            let queue = CommandQueue::new(Arc::new(HostDevice::new()));
            let buffer = queue.allocate::<u8>(size).unwrap();

            bencher.iter(|| {
                let event = queue.byte_set(&buffer, 0xAB, size, &[]).unwrap();
                queue.wait_all(&[event]).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_byte_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_copy");

    for size in [4096usize, 262_144, 4_194_304].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |bencher, &size| {
            let queue = CommandQueue::new(Arc::new(HostDevice::new()));
            let src = queue.allocate::<u8>(size).unwrap();
            let dst = queue.allocate::<u8>(size).unwrap();
            let seed = queue.byte_set(&src, 0x5A, size, &[]).unwrap();
            queue.wait_all(&[seed]).unwrap();

            bencher.iter(|| {
                let event = queue.byte_copy(&dst, &src, size, &[]).unwrap();
                queue.wait_all(&[event]).unwrap();
            });
        });
    }

    group.finish();
}

/// Scheduling overhead: a strictly sequential chain of small commands, so
/// the measurement is dominated by event bookkeeping rather than memcpy.
fn benchmark_dependency_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_chain");

    for links in [16usize, 64, 256].iter() {
        group.throughput(Throughput::Elements(*links as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(links),
            links,
            |bencher, &links| {
                let queue = CommandQueue::new(Arc::new(HostDevice::new()));
                let buffer = queue.allocate::<u8>(64).unwrap();

                bencher.iter(|| {
                    let mut last = queue.byte_set(&buffer, 0, 64, &[]).unwrap();
                    for i in 1..links {
                        last = queue.byte_set(&buffer, i as u8, 64, &[last]).unwrap();
                    }
                    queue.wait_all(&[last]).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_fill,
    benchmark_byte_set,
    benchmark_byte_copy,
    benchmark_dependency_chain
);
criterion_main!(benches);
