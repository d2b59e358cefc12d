#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use opjson::constants::{CONTEXT_POOL_CAPACITY, DETACH_THRESHOLD};
use opjson::{compile, Codec, Config, JsonObject, ProgramCache, RuntimeContext, Value};

#[derive(Debug, Default, Clone, PartialEq, JsonObject)]
struct Order {
    id: u64,
    customer: String,
    #[json(omitempty)]
    notes: Option<String>,
    lines: Vec<Line>,
    totals: BTreeMap<String, f64>,
}

#[derive(Debug, Default, Clone, PartialEq, JsonObject)]
struct Line {
    sku: String,
    qty: u32,
}

fn order(id: u64) -> Order {
    Order {
        id,
        customer: format!("customer-{id}"),
        notes: (id % 3 == 0).then(|| format!("note {id}")),
        lines: (0..(id % 5))
            .map(|i| Line {
                sku: format!("sku-{i}"),
                qty: i as u32 + 1,
            })
            .collect(),
        totals: BTreeMap::from([("net".to_string(), id as f64 * 1.5), ("tax".to_string(), 0.25)]),
    }
}

// --- TESTS ---

/// Many threads encoding and decoding the same types agree with a
/// single-threaded run and leave every pooled context clean.
#[test]
fn test_parallel_round_trips() {
    const THREADS: usize = 8;
    const ITERATIONS: u64 = 10_000;

    let expected: Vec<Vec<u8>> = (0..ITERATIONS)
        .map(|i| opjson::to_vec(&order(i)).unwrap())
        .collect();
    let expected = Arc::new(expected);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let expected = Arc::clone(&expected);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ITERATIONS {
                    let id = (i + t as u64 * 7) % ITERATIONS;
                    let value = order(id);
                    let json = opjson::to_vec(&value).unwrap();
                    assert_eq!(json, expected[id as usize]);
                    let back: Order = opjson::from_slice(&json).unwrap();
                    assert_eq!(back, value);
                }
                let mut ctx = opjson::acquire_context();
                ctx.configure(&Config::builder().indent("", "  ").use_number(true).build());
                opjson::release_context(ctx);
                let ctx = opjson::acquire_context();
                let clean = ctx.lengths().is_clear();
                opjson::release_context(ctx);
                clean
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

/// Threads racing to compile a type through one cache all get the same programs.
#[test]
fn test_concurrent_first_compile() {
    const THREADS: usize = 16;
    let cache = Arc::new(ProgramCache::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (cache.compile::<Order>(), cache.compile::<Vec<Order>>())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let (first_dense, first_keyed) = &results[0];
    for (dense, keyed) in &results[1..] {
        assert!(Arc::ptr_eq(first_dense, dense));
        assert!(Arc::ptr_eq(first_keyed, keyed));
    }
    let stats = cache.stats();
    assert_eq!(stats.dense, 1);
    assert_eq!(stats.fallback, 1);
}

/// Output on either side of the detach threshold is byte-identical to a
/// fresh encode, and repeated calls stay deterministic.
#[test]
fn test_detach_and_copy_paths() {
    let small = vec![1u8; 8];
    let large = vec![7u8; DETACH_THRESHOLD];

    let small_json = opjson::to_vec(&small).unwrap();
    let large_json = opjson::to_vec(&large).unwrap();
    assert!(small_json.len() <= DETACH_THRESHOLD);
    assert!(large_json.len() > DETACH_THRESHOLD);

    for _ in 0..100 {
        assert_eq!(opjson::to_vec(&small).unwrap(), small_json);
        assert_eq!(opjson::to_vec(&large).unwrap(), large_json);
    }
    let back: Vec<u8> = opjson::from_slice(&large_json).unwrap();
    assert_eq!(back, large);
}

/// A `Codec` is shared across threads by cloning.
#[test]
fn test_shared_codec() {
    let codec = Codec::new(Config::builder().indent("", " ").build());
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let codec = codec.clone();
            thread::spawn(move || {
                let json = codec.to_vec(&order(t * 10 + 1)).unwrap();
                let back: Order = codec.from_slice(&json).unwrap();
                (json, back)
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let (json, back) = handle.join().unwrap();
        let expected = order(t as u64 * 10 + 1);
        assert_eq!(back, expected);
        let mut reindented = Vec::new();
        opjson::indent(&mut reindented, &opjson::to_vec(&expected).unwrap(), "", " ").unwrap();
        assert_eq!(json, reindented);
    }
}

/// Batch encoding matches item-by-item encoding.
#[test]
fn test_batch_matches_sequential() {
    let orders: Vec<Order> = (0..500).map(order).collect();
    let batch = Codec::default().to_vec_batch(&orders).unwrap();
    for (value, json) in orders.iter().zip(&batch) {
        assert_eq!(&opjson::to_vec(value).unwrap(), json);
    }
}

#[derive(Debug, Default, Clone, PartialEq, JsonObject)]
struct Point {
    a: u32,
}

/// A context configured by one caller and released reaches the next caller
/// with the default layout and options.
#[test]
fn test_released_context_forgets_options() -> opjson::Result<()> {
    let point = compile::<Point>();
    let dynamic = compile::<Value>();
    let label = compile::<String>();

    let mut fresh = RuntimeContext::default();
    opjson::vm::encode(point.encode_indent(), &mut fresh, &Point { a: 1 })?;
    let expected_indent = fresh.take_output();
    opjson::vm::encode(label.encode_compact(), &mut fresh, &"<b>".to_string())?;
    let expected_label = fresh.take_output();

    let configured = Config::builder()
        .indent(">>", "\t")
        .escape_html(true)
        .use_number(true)
        .disallow_unknown_fields(true)
        .build();

    for _ in 0..CONTEXT_POOL_CAPACITY {
        let mut ctx = opjson::acquire_context();
        ctx.configure(&configured);
        opjson::release_context(ctx);

        let mut ctx = opjson::acquire_context();
        assert!(ctx.lengths().is_clear());
        opjson::vm::encode(point.encode_indent(), &mut ctx, &Point { a: 1 })?;
        assert_eq!(ctx.take_output(), expected_indent);
        opjson::vm::encode(label.encode_compact(), &mut ctx, &"<b>".to_string())?;
        assert_eq!(ctx.take_output(), expected_label);

        let mut target = Point::default();
        opjson::vm::decode(point.decode(), &mut ctx, br#"{"a":2,"extra":3}"#, 0, Some(&mut target))?;
        assert_eq!(target.a, 2);

        let mut number = Value::Null;
        opjson::vm::decode(dynamic.decode(), &mut ctx, b"1.50", 0, Some(&mut number))?;
        opjson::vm::encode(dynamic.encode_compact(), &mut ctx, &number)?;
        assert_eq!(ctx.take_output(), b"1.5");
        opjson::release_context(ctx);
    }
    Ok(())
}
