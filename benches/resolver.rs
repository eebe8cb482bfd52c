use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, Criterion};
use srv_proxy::{resolver::SrvResolver, Endpoint, ServiceResolver};
use std::{convert::Infallible, time::Instant};

const SRV: &str = "_lagom._tcp.example";

struct Static(Vec<Endpoint>);

#[async_trait]
impl SrvResolver for Static {
    type Record = Endpoint;
    type Error = Infallible;

    async fn get_srv_records_unordered(
        &self,
        _srv: &str,
    ) -> Result<(Vec<Self::Record>, Instant), Self::Error> {
        Ok((self.0.clone(), Instant::now()))
    }
}

fn records() -> Vec<Endpoint> {
    (0..8)
        .map(|i| Endpoint::new(format!("node{i}.example"), 9000, i % 3, 10 * i))
        .collect()
}

fn resolve(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let uncached = ServiceResolver::new(Static(records()));
    c.bench_function("resolve uncached", |b| {
        b.to_async(&runtime).iter(|| uncached.resolve(SRV))
    });

    let cached = ServiceResolver::new(Static(records())).caching_lookups(true);
    c.bench_function("resolve cached", |b| {
        b.to_async(&runtime).iter(|| cached.resolve(SRV))
    });
}

criterion_group!(benches, resolve);
criterion_main!(benches);
