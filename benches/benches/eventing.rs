// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use bracken_eventing::{Dispatcher, Event, EventData, NotifyFn};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Bindings are keyed by function pointer, so fan-out needs distinct
// functions. The distinct step constants also keep the bodies from being
// merged into one address by the optimizer.
macro_rules! counting_callbacks {
    ($($name:ident += $step:literal;)*) => {
        $(
            fn $name(_evt: &mut EventData, arg: Option<&dyn Any>) {
                if let Some(hits) = arg.and_then(|a| a.downcast_ref::<Cell<u64>>()) {
                    hits.set(hits.get() + $step);
                }
            }
        )*
    };
}

counting_callbacks! {
    count_1 += 1;
    count_2 += 2;
    count_3 += 3;
    count_4 += 4;
    count_5 += 5;
    count_6 += 6;
    count_7 += 7;
    count_8 += 8;
}

const FANOUT: [NotifyFn; 8] = [
    count_1, count_2, count_3, count_4, count_5, count_6, count_7, count_8,
];

fn chain_next(evt: &mut EventData, arg: Option<&dyn Any>) {
    if let Some(next) = arg.and_then(|a| a.downcast_ref::<Event>()) {
        next.trigger(None, None, None).expect("chain trigger");
    }
    evt.handled = true;
}

fn bench_eventing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bracken_eventing");
    group.sample_size(50);

    for &bindings in &[1_usize, 4, 8] {
        group.bench_function(format!("trigger_fanout(n={bindings})"), |b| {
            let dispatcher = Dispatcher::new(Rc::new(())).expect("dispatcher");
            let event = dispatcher.create_event("bench").expect("event");
            let hits: Rc<Cell<u64>> = Rc::new(Cell::new(0));
            for cb in &FANOUT[..bindings] {
                event.bind(*cb, Some(hits.clone())).expect("bind");
            }
            b.iter(|| {
                event.trigger(None, None, None).expect("trigger");
                black_box(hits.get())
            });
        });
    }

    group.bench_function("bind_unbind_churn", |b| {
        let dispatcher = Dispatcher::new(Rc::new(())).expect("dispatcher");
        let event = dispatcher.create_event("churn").expect("event");
        b.iter(|| {
            event.bind(count_1, None).expect("bind");
            event.unbind(count_1);
            black_box(event.binding_count())
        });
    });

    for &depth in &[2_usize, 8] {
        group.bench_function(format!("nested_chain(depth={depth})"), |b| {
            let dispatcher = Dispatcher::new(Rc::new(())).expect("dispatcher");
            let events: Vec<Event> = (0..depth)
                .map(|i| {
                    dispatcher
                        .create_event(&format!("link{i}"))
                        .expect("event")
                })
                .collect();
            for pair in events.windows(2) {
                pair[0]
                    .bind(chain_next, Some(Rc::new(pair[1].clone())))
                    .expect("bind");
            }
            let hits: Rc<Cell<u64>> = Rc::new(Cell::new(0));
            events[depth - 1]
                .bind(count_1, Some(hits.clone()))
                .expect("bind");
            b.iter(|| {
                events[0].trigger(None, None, None).expect("trigger");
                black_box(hits.get())
            });
        });
    }

    group.bench_function("prepared_trigger", |b| {
        let dispatcher = Dispatcher::new(Rc::new(())).expect("dispatcher");
        let event = dispatcher.create_event("prepared").expect("event");
        let hits: Rc<Cell<u64>> = Rc::new(Cell::new(0));
        event.bind(count_1, Some(hits.clone())).expect("bind");
        b.iter_batched(
            || dispatcher.prepare_trigger().expect("prepare"),
            |prepared| {
                event.trigger_prepared(None, None, None, prepared);
                black_box(hits.get())
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_eventing);
criterion_main!(benches);
