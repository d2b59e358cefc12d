#![allow(missing_docs)]

use std::collections::BTreeMap;

use opjson::constants::MAX_DECODE_DEPTH;
use opjson::{JsonError, JsonObject, Value};

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Fixed {
    slots: [u8; 3],
    names: [String; 2],
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Nullable {
    list: Vec<u32>,
    map: BTreeMap<String, u32>,
    ptr: Option<Box<u32>>,
    grid: [u32; 2],
    count: u32,
    text: String,
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Tree {
    label: String,
    children: Vec<Tree>,
}

fn nested_arrays(depth: usize) -> Vec<u8> {
    let mut input = Vec::with_capacity(depth * 2);
    input.resize(depth, b'[');
    input.resize(depth * 2, b']');
    input
}

fn nested_trees(depth: usize) -> Vec<u8> {
    let mut input = Vec::new();
    for _ in 1..depth {
        input.extend_from_slice(br#"{"children":["#);
    }
    input.extend_from_slice(b"{}");
    for _ in 1..depth {
        input.extend_from_slice(b"]}");
    }
    input
}

// --- TESTS ---

/// Short input resets the rest of a fixed array; long input is skipped.
#[test]
fn test_fixed_arrays() -> opjson::Result<()> {
    let mut value = Fixed {
        slots: [9, 9, 9],
        names: ["a".to_string(), "b".to_string()],
    };
    opjson::from_slice_into(br#"{"slots":[1],"names":["x","y","z",{"ignored":[1]}]}"#, &mut value)?;
    assert_eq!(value.slots, [1, 0, 0]);
    assert_eq!(value.names, ["x".to_string(), "y".to_string()]);

    assert_eq!(opjson::to_vec(&value)?, br#"{"slots":[1,0,0],"names":["x","y"]}"#);

    opjson::from_slice_into(br#"{"slots":[],"names":null}"#, &mut value)?;
    assert_eq!(value.slots, [0, 0, 0]);
    assert_eq!(value.names, [String::new(), String::new()]);

    let mut top = [7i64, 8, 9];
    opjson::from_slice_into(b"null", &mut top)?;
    assert_eq!(top, [0, 0, 0]);
    Ok(())
}

/// `null` resets slices, maps, arrays and pointers and leaves scalars alone.
#[test]
fn test_null_handling() -> opjson::Result<()> {
    let mut value = Nullable {
        list: vec![1, 2],
        map: BTreeMap::from([("k".to_string(), 1)]),
        ptr: Some(Box::new(5)),
        grid: [3, 4],
        count: 7,
        text: "keep".to_string(),
    };
    opjson::from_slice_into(
        br#"{"list":null,"map":null,"ptr":null,"grid":null,"count":null,"text":null}"#,
        &mut value,
    )?;
    assert!(value.list.is_empty());
    assert!(value.map.is_empty());
    assert_eq!(value.ptr, None);
    assert_eq!(value.grid, [0, 0]);
    assert_eq!(value.count, 7);
    assert_eq!(value.text, "keep");
    Ok(())
}

/// A `null` pointer encodes as `null` and decodes back to `None`.
#[test]
fn test_pointer_round_trip() -> opjson::Result<()> {
    let value = Nullable::default();
    let json = opjson::to_vec(&value)?;
    assert_eq!(json, br#"{"list":[],"map":{},"ptr":null,"grid":[0,0],"count":0,"text":""}"#);
    assert_eq!(opjson::from_slice::<Nullable>(&json)?, value);

    let back: Nullable = opjson::from_slice(br#"{"ptr":12}"#)?;
    assert_eq!(back.ptr.as_deref(), Some(&12));
    Ok(())
}

/// The decoder accepts exactly `MAX_DECODE_DEPTH` levels of nesting.
#[test]
fn test_depth_ceiling_dynamic() {
    // Dropping a deeply nested `Value` recurses, so give it room.
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let ok: opjson::Result<Value> = opjson::from_slice(&nested_arrays(MAX_DECODE_DEPTH));
            assert!(ok.is_ok());

            let err = opjson::from_slice::<Value>(&nested_arrays(MAX_DECODE_DEPTH + 1)).unwrap_err();
            assert!(matches!(err, JsonError::MaxDepthExceeded { limit, .. } if limit == MAX_DECODE_DEPTH));

            assert!(opjson::valid(&nested_arrays(MAX_DECODE_DEPTH)));
            assert!(!opjson::valid(&nested_arrays(MAX_DECODE_DEPTH + 1)));
        });
    if let Ok(handle) = handle {
        assert!(handle.join().is_ok());
    }
}

/// Typed decoding enforces the same ceiling without recursing.
#[test]
fn test_depth_ceiling_typed() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            // Each tree level is an object plus an array.
            let levels = MAX_DECODE_DEPTH / 2;
            let tree: opjson::Result<Tree> = opjson::from_slice(&nested_trees(levels));
            assert!(tree.is_ok());

            let err = opjson::from_slice::<Tree>(&nested_trees(levels + 1)).unwrap_err();
            assert!(matches!(err, JsonError::MaxDepthExceeded { .. }));

            // Skipped values count too.
            let mut skipped = br#"{"unknown":"#.to_vec();
            skipped.extend_from_slice(&nested_arrays(MAX_DECODE_DEPTH));
            skipped.push(b'}');
            let err = opjson::from_slice::<Tree>(&skipped).unwrap_err();
            assert!(matches!(err, JsonError::MaxDepthExceeded { .. }));
        });
    if let Ok(handle) = handle {
        assert!(handle.join().is_ok());
    }
}

/// Type mismatches name the value, the type and the field.
#[test]
fn test_type_errors() {
    let err = opjson::from_slice::<Nullable>(br#"{"count":"seven"}"#).unwrap_err();
    match err {
        JsonError::UnmarshalType {
            value,
            type_name,
            field,
            offset,
        } => {
            assert_eq!(value, "string");
            assert_eq!(type_name, "u32");
            assert_eq!(field.as_deref(), Some("count"));
            assert_eq!(offset, 9);
        }
        other => panic!("expected a type error, got {other:?}"),
    }

    let err = opjson::from_slice::<Vec<u32>>(b"{}").unwrap_err();
    assert!(matches!(err, JsonError::UnmarshalType { .. }));

    let err = opjson::from_slice::<bool>(b"1").unwrap_err();
    assert!(matches!(err, JsonError::UnmarshalType { .. }));
}

/// Fields decoded before an error keep their new values.
#[test]
fn test_partial_update_on_error() {
    let mut value = Nullable::default();
    let result = opjson::from_slice_into(br#"{"count":3,"text":4,"list":[1]}"#, &mut value);
    assert!(result.is_err());
    assert_eq!(value.count, 3);
    assert!(value.list.is_empty());
}

/// Malformed input is a syntax error with the offset where scanning stopped.
#[test]
fn test_syntax_errors() {
    let cases: [(&[u8], usize); 5] = [
        (b"", 0),
        (b"[1,]", 3),
        (br#"{"a":1"#, 6),
        (b"tru", 3),
        (br#"{"a" 1}"#, 5),
    ];
    for (input, offset) in cases {
        let err = opjson::from_slice::<Value>(input).unwrap_err();
        match err {
            JsonError::Syntax { offset: at, .. } => assert_eq!(at, offset, "{input:?}"),
            other => panic!("expected a syntax error for {input:?}, got {other:?}"),
        }
    }
}

/// Invalid UTF-8 and lone surrogates become U+FFFD.
#[test]
fn test_string_repair() -> opjson::Result<()> {
    let s: String = opjson::from_slice(b"\"a\xffb\"")?;
    assert_eq!(s, "a\u{FFFD}b");

    let mut input = b"\"x".to_vec();
    input.push(92);
    input.extend_from_slice(b"ud800y\"");
    let s: String = opjson::from_slice(&input)?;
    assert_eq!(s, "x\u{FFFD}y");

    let mut input = b"\"".to_vec();
    input.push(92);
    input.extend_from_slice(b"ud83d");
    input.push(92);
    input.extend_from_slice(b"ude00\"");
    let s: String = opjson::from_slice(&input)?;
    assert_eq!(s, "\u{1F600}");
    Ok(())
}

/// Recursive types decode at any depth below the ceiling.
#[test]
fn test_recursive_round_trip() -> opjson::Result<()> {
    let tree = Tree {
        label: "root".to_string(),
        children: vec![
            Tree {
                label: "a".to_string(),
                children: vec![Tree {
                    label: "a1".to_string(),
                    children: Vec::new(),
                }],
            },
            Tree {
                label: "b".to_string(),
                children: Vec::new(),
            },
        ],
    };
    let json = opjson::to_vec(&tree)?;
    assert_eq!(
        json,
        br#"{"label":"root","children":[{"label":"a","children":[{"label":"a1","children":[]}]},{"label":"b","children":[]}]}"#
    );
    assert_eq!(opjson::from_slice::<Tree>(&json)?, tree);

    let indented = opjson::to_vec_indent(&tree, "", "  ")?;
    let mut expected = Vec::new();
    opjson::indent(&mut expected, &json, "", "  ")?;
    assert_eq!(indented, expected);
    Ok(())
}
