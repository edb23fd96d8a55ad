use criterion::*;
use stackstride::{probe, Address, AddressTable};

fn probing(c: &mut Criterion) {
  let mut group = c.benchmark_group("probe");
  group.throughput(Throughput::Elements(1));
  group.bench_function(
    "stackstride",
    |b| b.iter(|| black_box(probe()))
  );
}

fn publish_read(c: &mut Criterion) {
  let mut group = c.benchmark_group("publish_read");
  group.throughput(Throughput::Elements(1));
  let table = AddressTable::new(2);
  group.bench_function(
    "racy",
    |b| b.iter(|| {
      table.publish(0, Address::from_usize(black_box(0x1000)));
      black_box(table.read(0))
    })
  );
  group.bench_function(
    "atomic",
    |b| b.iter(|| {
      table.publish_atomic(0, Address::from_usize(black_box(0x1000)));
      black_box(table.read_atomic(0))
    })
  );
}

criterion_group!(
  benches,
  probing,
  publish_read,
);
criterion_main!(benches);
