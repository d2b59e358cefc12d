#![allow(missing_docs)]

use std::collections::HashMap;

use opjson::{IsZero, JsonObject, Value};

#[derive(Debug, Default, JsonObject)]
struct OmitEmpty {
    #[json(omitempty)]
    flag: bool,
    #[json(omitempty)]
    count: i32,
    #[json(omitempty)]
    ratio: f64,
    #[json(omitempty)]
    text: String,
    #[json(omitempty)]
    list: Vec<u8>,
    #[json(omitempty)]
    map: HashMap<String, u8>,
    #[json(omitempty)]
    ptr: Option<Box<u8>>,
    #[json(omitempty)]
    any: Value,
    #[json(omitempty)]
    arr: [u8; 0],
    #[json(omitempty)]
    inner: Point,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, JsonObject)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, Default, JsonObject)]
struct OmitZero {
    #[json(omitzero)]
    count: u64,
    #[json(omitzero)]
    ratio: f64,
    #[json(omitzero)]
    text: String,
    #[json(omitzero)]
    list: Vec<u8>,
    #[json(omitzero)]
    maybe_list: Option<Vec<u8>>,
    #[json(omitzero)]
    point: Point,
    #[json(omitzero)]
    grid: [i32; 3],
    #[json(omitzero)]
    ptr: Option<Point>,
}

#[derive(Debug, Default, JsonObject)]
#[json(is_zero)]
struct Deadline {
    epoch: i64,
}

impl IsZero for Deadline {
    fn is_zero(&self) -> bool {
        self.epoch <= 0
    }
}

#[derive(Debug, Default, JsonObject)]
struct Task {
    name: String,
    #[json(omitzero)]
    due: Deadline,
    #[json(omitempty, omitzero)]
    tags: Option<Vec<String>>,
}

// --- TESTS ---

/// Every empty field is left out; a struct is never empty.
#[test]
fn test_omitempty_all_empty() -> opjson::Result<()> {
    let json = opjson::to_vec(&OmitEmpty::default())?;
    assert_eq!(json, br#"{"inner":{"x":0,"y":0}}"#);
    Ok(())
}

/// Non-empty values are kept, including a pointer to zero.
#[test]
fn test_omitempty_populated() -> opjson::Result<()> {
    let mut map = HashMap::new();
    map.insert("k".to_string(), 1);
    let value = OmitEmpty {
        flag: true,
        count: -1,
        ratio: 0.5,
        text: "t".to_string(),
        list: vec![0],
        map,
        ptr: Some(Box::new(0)),
        any: Value::Bool(false),
        arr: [],
        inner: Point::default(),
    };
    let json = opjson::to_vec(&value)?;
    assert_eq!(
        json,
        br#"{"flag":true,"count":-1,"ratio":0.5,"text":"t","list":[0],"map":{"k":1},"ptr":0,"any":false,"inner":{"x":0,"y":0}}"#
    );
    Ok(())
}

/// `omitzero` compares against the type's zero value.
#[test]
fn test_omitzero() -> opjson::Result<()> {
    let json = opjson::to_vec(&OmitZero::default())?;
    // A Vec always exists, so it is never zero.
    assert_eq!(json, br#"{"list":[]}"#);

    let value = OmitZero {
        count: 0,
        ratio: -0.0,
        text: String::new(),
        list: Vec::new(),
        maybe_list: Some(Vec::new()),
        point: Point { x: 0, y: 1 },
        grid: [0, 0, 2],
        ptr: Some(Point::default()),
    };
    let json = opjson::to_vec(&value)?;
    // Negative zero is not the zero bit pattern; a pointer to a zero struct is zero.
    assert_eq!(
        json,
        br#"{"ratio":-0,"list":[],"maybe_list":[],"point":{"x":0,"y":1},"grid":[0,0,2]}"#
    );
    Ok(())
}

/// A bound `IsZero` hook decides for its type.
#[test]
fn test_is_zero_hook() -> opjson::Result<()> {
    let task = Task {
        name: "a".to_string(),
        due: Deadline { epoch: -5 },
        tags: Some(Vec::new()),
    };
    // The hook says zero; the empty list behind a pointer is empty.
    assert_eq!(opjson::to_vec(&task)?, br#"{"name":"a"}"#);

    let task = Task {
        name: "b".to_string(),
        due: Deadline { epoch: 10 },
        tags: Some(vec!["x".to_string()]),
    };
    assert_eq!(
        opjson::to_vec(&task)?,
        br#"{"name":"b","due":{"epoch":10},"tags":["x"]}"#
    );
    Ok(())
}

/// An object whose fields are all omitted is `{}` in both layouts.
#[test]
fn test_everything_omitted() -> opjson::Result<()> {
    #[derive(Debug, Default, JsonObject)]
    struct Sparse {
        #[json(omitempty)]
        a: u8,
        #[json(omitempty)]
        b: String,
    }

    #[derive(Debug, Default, JsonObject)]
    struct Holder {
        items: Vec<Sparse>,
    }

    let holder = Holder {
        items: vec![Sparse::default(), Sparse { a: 1, b: String::new() }],
    };
    assert_eq!(opjson::to_vec(&holder)?, br#"{"items":[{},{"a":1}]}"#);
    assert_eq!(
        String::from_utf8_lossy(&opjson::to_vec_indent(&holder, "", "  ")?),
        "{\n  \"items\": [\n    {},\n    {\n      \"a\": 1\n    }\n  ]\n}"
    );
    Ok(())
}
