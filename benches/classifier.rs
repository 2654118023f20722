//! Benchmark for the backend response classifier
//!
//! Every API round trip passes through classify(), so it sits on the hot
//! path of both state machines while they poll.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use tenant_master_operator::provision::ask::classify::classify;

const SUCCESS_BODY: &str = r#"{"cluster_id":"cb2a54e5e8c44f5b78fbbf17ac9f2b1d4","request_id":"0E49B2E4-F4A7","task_id":"T-5a54309c80282e39ea00002f"}"#;

const ERROR_BODY: &str = concat!(
    "ERROR: SDK.ServerError\n",
    "ErrorCode: 0\n",
    "Recommend: https://error-center.aliyun.com\n",
    "RequestId: 7B3B272D-3CF3-4F2E-9FAD-0A1D2E3F4A5B\n",
    "Message: {\"code\":\"ClusterNameAlreadyExist\",\"message\":\"cluster name default-6b3fce-demo already exist in your clusters\",\"requestId\":\"7B3B272D\",\"status\":400}",
);

fn bench_classify_success(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");
    group.throughput(Throughput::Elements(1));

    group.bench_function("success_body", |b| {
        b.iter(|| {
            let outcome = classify(black_box(SUCCESS_BODY)).unwrap();
            assert!(outcome.is_none());
        });
    });

    group.bench_function("empty_body", |b| {
        b.iter(|| {
            let outcome = classify(black_box("")).unwrap();
            assert!(outcome.is_none());
        });
    });

    group.finish();
}

fn bench_classify_error(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");
    group.throughput(Throughput::Elements(1));

    group.bench_function("error_body", |b| {
        b.iter(|| {
            let outcome = classify(black_box(ERROR_BODY)).unwrap();
            assert!(outcome.is_some());
        });
    });

    group.finish();
}

fn bench_classify_cluster_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");
    group.throughput(Throughput::Elements(1));

    // A full-account listing is the largest body the classifier ever sees.
    let listing: Vec<_> = (0..200)
        .map(|i| {
            json!({
                "name": format!("default-{:06x}-tenant-{}", i, i),
                "cluster_id": format!("c{:031x}", i),
                "cluster_type": "Ask",
                "state": "running",
                "region_id": "cn-hangzhou",
            })
        })
        .collect();
    let body = serde_json::to_string(&listing).unwrap();

    group.bench_function("listing_200_clusters", |b| {
        b.iter(|| {
            let outcome = classify(black_box(&body)).unwrap();
            assert!(outcome.is_none());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classify_success,
    bench_classify_error,
    bench_classify_cluster_listing,
);
criterion_main!(benches);
