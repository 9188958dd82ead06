use criterion::{BatchSize, Criterion, Throughput, black_box};
use spark_registry::{ChangeNotification, Interest, NotificationBufferNormalizer};
use std::{collections::VecDeque, env, time::Duration};

/// 规范化器吞吐基准：不同批次长度下处理原始事件的成本。
///
/// # 设计背景（Why）
/// - 规范化器处于每条实例变更的必经路径上，批次长度决定了定界标记的合成频率与出站队列的增长幅度；
///   需要基准确认单条透传与大批次包裹都维持在常数级的单事件开销。
///
/// # 逻辑解析（How）
/// - 每轮构造 `runs` 个批次，每个批次 `len` 条 `Add` 后跟一个哨兵；出站队列在批次之间清空，模拟消费者及时拉取。
fn bench_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalizer");
    for len in [1usize, 2, 16, 256] {
        let runs = 4096 / len;
        let events: Vec<ChangeNotification<u64>> = (0..runs)
            .flat_map(|run| {
                (0..len)
                    .map(move |i| ChangeNotification::Add((run * len + i) as u64))
                    .chain(std::iter::once(ChangeNotification::BufferSentinel))
            })
            .collect();
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_function(format!("batch_len_{len}"), |b| {
            b.iter_batched(
                || events.clone(),
                |events| {
                    let mut normalizer = NotificationBufferNormalizer::new(Interest::for_vip("bench"));
                    let mut outbox = VecDeque::with_capacity(len + 2);
                    let mut delivered = 0usize;
                    for event in events {
                        let is_sentinel = event.is_sentinel();
                        if normalizer.on_raw_event(event, &mut outbox).is_err() {
                            break;
                        }
                        if is_sentinel {
                            delivered += outbox.len();
                            outbox.clear();
                        }
                    }
                    black_box(delivered)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_normalizer(&mut criterion);
    criterion.final_summary();
}
