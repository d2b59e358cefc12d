#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};

use opjson::{
    Bytes, Codec, Config, HookError, JsonError, JsonObject, MarshalJson, Number, RawJson, UnmarshalJson, Value,
};

#[derive(Debug, Default, Clone, PartialEq, JsonObject)]
struct Person {
    #[json(rename = "Name")]
    name: String,
    #[json(rename = "Age")]
    age: u32,
}

#[derive(Debug, Default, Clone, PartialEq, JsonObject)]
struct Inventory {
    title: String,
    counts: Vec<u64>,
    owner: Person,
    tags: BTreeMap<String, i32>,
    ratio: f64,
    #[json(omitempty)]
    note: Option<String>,
}

fn create_inventory() -> Inventory {
    let mut tags = BTreeMap::new();
    tags.insert("b".to_string(), -2);
    tags.insert("a".to_string(), 1);
    Inventory {
        title: "Integration Test".to_string(),
        counts: (0..5).collect(),
        owner: Person {
            name: "Alice".to_string(),
            age: 30,
        },
        tags,
        ratio: 0.25,
        note: None,
    }
}

// --- TESTS ---

/// Compact layout of a nested struct.
#[test]
fn test_compact_layout() -> opjson::Result<()> {
    let json = opjson::to_vec(&create_inventory())?;
    assert_eq!(
        String::from_utf8_lossy(&json),
        r#"{"title":"Integration Test","counts":[0,1,2,3,4],"owner":{"Name":"Alice","Age":30},"tags":{"a":1,"b":-2},"ratio":0.25}"#
    );
    Ok(())
}

/// Indent layout with a two-space unit.
#[test]
fn test_indent_layout() -> opjson::Result<()> {
    let person = Person {
        name: "Alice".to_string(),
        age: 30,
    };
    let json = opjson::to_vec_indent(&person, "", "  ")?;
    assert_eq!(json, b"{\n  \"Name\": \"Alice\",\n  \"Age\": 30\n}");
    Ok(())
}

/// Nested containers and empty containers in the indent layout.
#[test]
fn test_indent_nested() -> opjson::Result<()> {
    let mut inv = create_inventory();
    inv.counts = vec![1];
    inv.tags.clear();
    let json = opjson::to_vec_indent(&inv, "", "\t")?;
    let expected = "{\n\t\"title\": \"Integration Test\",\n\t\"counts\": [\n\t\t1\n\t],\n\t\"owner\": {\n\t\t\"Name\": \"Alice\",\n\t\t\"Age\": 30\n\t},\n\t\"tags\": {},\n\t\"ratio\": 0.25\n}";
    assert_eq!(String::from_utf8_lossy(&json), expected);

    // Indenting the compact text gives the same bytes.
    let mut reindented = Vec::new();
    opjson::indent(&mut reindented, &opjson::to_vec(&inv)?, "", "\t")?;
    assert_eq!(reindented, json);
    Ok(())
}

/// Encode then decode gives the value back.
#[test]
fn test_round_trip() -> opjson::Result<()> {
    let inv = create_inventory();
    let back: Inventory = opjson::from_slice(&opjson::to_vec(&inv)?)?;
    assert_eq!(back, inv);

    let back: Inventory = opjson::from_slice(&opjson::to_vec_indent(&inv, "\t", "    ")?)?;
    assert_eq!(back, inv);
    Ok(())
}

/// Keys match exactly first, then ASCII case-insensitively.
#[test]
fn test_case_insensitive_keys() -> opjson::Result<()> {
    let p: Person = opjson::from_slice(br#"{"name":"Bob","AGE":7}"#)?;
    assert_eq!(p.name, "Bob");
    assert_eq!(p.age, 7);
    Ok(())
}

/// Unknown keys are skipped unless the codec forbids them.
#[test]
fn test_unknown_fields() -> opjson::Result<()> {
    let input = br#"{"Name":"Eve","extra":{"deep":[1,2,{"x":null}]},"Age":3}"#;
    let p: Person = opjson::from_slice(input)?;
    assert_eq!(p.age, 3);

    let strict = Codec::new(Config::builder().disallow_unknown_fields(true).build());
    match strict.from_slice::<Person>(input) {
        Err(JsonError::UnknownField { field, offset }) => {
            assert_eq!(field, "extra");
            assert_eq!(offset, 14);
        }
        other => panic!("expected an unknown field error, got {other:?}"),
    }
    Ok(())
}

/// Decoding into an existing value keeps what the input does not mention.
#[test]
fn test_decode_into_existing() -> opjson::Result<()> {
    let mut inv = create_inventory();
    opjson::from_slice_into(br#"{"title":"t2","tags":{"c":3,"a":10}}"#, &mut inv)?;
    assert_eq!(inv.title, "t2");
    assert_eq!(inv.counts, [0, 1, 2, 3, 4]);
    // Maps merge.
    assert_eq!(inv.tags.len(), 3);
    assert_eq!(inv.tags["a"], 10);
    assert_eq!(inv.tags["b"], -2);
    Ok(())
}

/// Map keys are sorted; integer keys sort by their text.
#[test]
fn test_map_key_order() -> opjson::Result<()> {
    let mut m = HashMap::new();
    for k in [10u32, 9, 100, 1] {
        m.insert(k, k * 2);
    }
    assert_eq!(opjson::to_vec(&m)?, br#"{"1":2,"10":20,"100":200,"9":18}"#);

    let back: HashMap<u32, u32> = opjson::from_slice(br#"{"7":1,"8":2}"#)?;
    assert_eq!(back[&7], 1);

    let err = opjson::from_slice::<HashMap<u32, u32>>(br#"{"x":1}"#).unwrap_err();
    assert!(matches!(err, JsonError::UnmarshalType { .. }));
    Ok(())
}

/// HTML-sensitive characters are escaped by default.
#[test]
fn test_escape_html() -> opjson::Result<()> {
    let s = "<a href=\"x\">&</a>".to_string();
    let escaped = String::from_utf8(opjson::to_vec(&s)?).unwrap_or_default();
    let bs = char::from(92);
    assert_eq!(
        escaped,
        format!("\"{bs}u003ca href={bs}\"x{bs}\"{bs}u003e{bs}u0026{bs}u003c/a{bs}u003e\"")
    );

    let plain = Codec::new(Config::builder().escape_html(false).build());
    assert_eq!(plain.to_vec(&s)?, br#""<a href=\"x\">&</a>""#);
    Ok(())
}

/// Integers reject fractions, exponents and overflow.
#[test]
fn test_integer_strictness() {
    for input in [&b"1.5"[..], b"1e2", b"256", b"-1"] {
        let err = opjson::from_slice::<u8>(input).unwrap_err();
        assert!(matches!(err, JsonError::UnmarshalType { .. }), "{input:?}");
    }
    assert_eq!(opjson::from_slice::<i8>(b"-128").ok(), Some(-128));
}

/// Floats use the shortest round-trip text.
#[test]
fn test_float_format() -> opjson::Result<()> {
    let values = vec![0.1f64, 1e21, 1e-7, 123456789.0, -0.0];
    assert_eq!(opjson::to_vec(&values)?, b"[0.1,1e+21,1e-7,123456789,-0]");
    assert_eq!(opjson::to_vec(&0.1f32)?, b"0.1");

    let err = opjson::to_vec(&f64::NAN).unwrap_err();
    assert!(matches!(err, JsonError::UnsupportedValue { .. }));
    Ok(())
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Quoted {
    #[json(string)]
    id: u64,
    #[json(string)]
    flag: bool,
    #[json(string)]
    label: String,
    #[json(string)]
    maybe: Option<i32>,
    #[json(string)]
    list: Vec<u8>,
}

/// The `string` option wraps scalars in a JSON string.
#[test]
fn test_string_option() -> opjson::Result<()> {
    let q = Quoted {
        id: 42,
        flag: true,
        label: "hi".to_string(),
        maybe: Some(-3),
        list: vec![1],
    };
    let json = opjson::to_vec(&q)?;
    assert_eq!(
        json,
        br#"{"id":"42","flag":"true","label":"\"hi\"","maybe":"-3","list":[1]}"#
    );
    let back: Quoted = opjson::from_slice(&json)?;
    assert_eq!(back, q);

    let err = opjson::from_slice::<Quoted>(br#"{"id":42}"#).unwrap_err();
    assert!(matches!(err, JsonError::UnmarshalType { .. }));
    Ok(())
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Base {
    id: u32,
    name: String,
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Extended {
    #[json(flatten)]
    base: Base,
    name: String,
    #[json(flatten)]
    more: Option<Box<Extra>>,
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Extra {
    level: u8,
}

/// Flattened fields are promoted; the shallower field wins a key conflict.
#[test]
fn test_flatten() -> opjson::Result<()> {
    let value = Extended {
        base: Base {
            id: 1,
            name: "inner".to_string(),
        },
        name: "outer".to_string(),
        more: None,
    };
    assert_eq!(opjson::to_vec(&value)?, br#"{"id":1,"name":"outer"}"#);

    let back: Extended = opjson::from_slice(br#"{"id":5,"name":"n","level":9}"#)?;
    assert_eq!(back.base.id, 5);
    assert_eq!(back.name, "n");
    assert_eq!(back.base.name, "");
    // Decoding allocates the flattened pointer.
    assert_eq!(back.more.map(|m| m.level), Some(9));
    Ok(())
}

/// `skip` leaves the field out of both directions.
#[test]
fn test_skip() -> opjson::Result<()> {
    #[derive(Debug, Default, JsonObject)]
    struct Session {
        user: String,
        #[json(skip)]
        token: String,
    }

    let s = Session {
        user: "u".to_string(),
        token: "secret".to_string(),
    };
    assert_eq!(opjson::to_vec(&s)?, br#"{"user":"u"}"#);
    let back: Session = opjson::from_slice(br#"{"user":"v","token":"t"}"#)?;
    assert_eq!(back.token, "");
    Ok(())
}

/// Byte buffers are base64 strings.
#[test]
fn test_bytes() -> opjson::Result<()> {
    let b = Bytes(b"hello".to_vec());
    assert_eq!(opjson::to_vec(&b)?, br#""aGVsbG8=""#);
    let back: Bytes = opjson::from_slice(br#""aGVsbG8=""#)?;
    assert_eq!(back, b);

    let err = opjson::from_slice::<Bytes>(br#""***""#).unwrap_err();
    assert!(matches!(err, JsonError::UnmarshalType { .. }));
    Ok(())
}

#[derive(Debug, Default, JsonObject)]
struct Envelope {
    kind: String,
    payload: RawJson,
}

/// Raw JSON is captured on decode and spliced on encode.
#[test]
fn test_raw_json() -> opjson::Result<()> {
    let env: Envelope = opjson::from_slice(br#"{"kind":"k","payload": { "a" : [1, 2] }}"#)?;
    assert_eq!(env.payload.as_bytes(), br#"{ "a" : [1, 2] }"#);
    assert_eq!(opjson::to_vec(&env)?, br#"{"kind":"k","payload":{"a":[1,2]}}"#);

    let indented = opjson::to_vec_indent(&env, "", " ")?;
    assert_eq!(
        String::from_utf8_lossy(&indented),
        "{\n \"kind\": \"k\",\n \"payload\": {\n  \"a\": [\n   1,\n   2\n  ]\n }\n}"
    );

    assert!(RawJson::new(b"{".to_vec()).is_err());
    Ok(())
}

/// Spliced raw JSON is HTML-escaped the same way in both layouts.
#[test]
fn test_raw_json_escaping_matches_across_layouts() -> opjson::Result<()> {
    let env = Envelope {
        kind: "<k>".to_string(),
        payload: RawJson::new(br#"{"<a>":"x&y"}"#.to_vec())?,
    };
    let bs = char::from(92);

    let compact = String::from_utf8(opjson::to_vec(&env)?).unwrap_or_default();
    assert_eq!(
        compact,
        format!(r#"{{"kind":"{bs}u003ck{bs}u003e","payload":{{"{bs}u003ca{bs}u003e":"x{bs}u0026y"}}}}"#)
    );

    let indented = opjson::to_vec_indent(&env, "", "  ")?;
    let mut squeezed = Vec::new();
    opjson::compact(&mut squeezed, &indented)?;
    assert_eq!(String::from_utf8(squeezed).unwrap_or_default(), compact);

    let plain = Codec::new(Config::builder().escape_html(false).indent("", "  ").build());
    let indented = String::from_utf8(plain.to_vec(&env)?).unwrap_or_default();
    assert!(indented.contains(r#""<a>": "x&y""#), "{indented}");
    Ok(())
}

/// Numbers keep their text.
#[test]
fn test_number() -> opjson::Result<()> {
    let n: Number = opjson::from_slice(b"1.50")?;
    assert_eq!(n.as_str(), "1.50");
    assert_eq!(opjson::to_vec(&n)?, b"1.50");

    let n: Number = opjson::from_slice(br#""12""#)?;
    assert_eq!(n.as_i64(), Some(12));
    Ok(())
}

/// `use_number` keeps number text inside dynamic values.
#[test]
fn test_use_number() -> opjson::Result<()> {
    let v: Value = opjson::from_slice(b"[1.50, 1e3]")?;
    assert_eq!(opjson::to_vec(&v)?, b"[1.5,1000]");

    let codec = Codec::new(Config::builder().use_number(true).build());
    let v: Value = codec.from_slice(b"[1.50, 1e3]")?;
    assert_eq!(codec.to_vec(&v)?, b"[1.50,1e3]");
    Ok(())
}

#[derive(Debug, Default, PartialEq, JsonObject)]
#[json(opaque, marshal, unmarshal)]
struct Celsius(f64);

impl MarshalJson for Celsius {
    fn marshal_json(&self) -> Result<Vec<u8>, HookError> {
        if self.0 < -273.15 {
            return Err("below absolute zero".into());
        }
        Ok(format!("\"{}C\"", self.0).into_bytes())
    }
}

impl UnmarshalJson for Celsius {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), HookError> {
        let text: String = opjson::from_slice(data)?;
        let digits = text.strip_suffix('C').ok_or("missing unit")?;
        self.0 = digits.parse()?;
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, JsonObject)]
struct Reading {
    at: u32,
    temp: Celsius,
}

/// Marshal and unmarshal hooks replace the structural codec.
#[test]
fn test_hooks() -> opjson::Result<()> {
    let r = Reading {
        at: 1,
        temp: Celsius(21.5),
    };
    let json = opjson::to_vec(&r)?;
    assert_eq!(json, br#"{"at":1,"temp":"21.5C"}"#);
    assert_eq!(opjson::from_slice::<Reading>(&json)?, r);

    let err = opjson::to_vec(&Celsius(-300.0)).unwrap_err();
    match err {
        JsonError::Marshaler { source, .. } => assert_eq!(source.to_string(), "below absolute zero"),
        other => panic!("expected a marshaler error, got {other:?}"),
    }

    let err = opjson::from_slice::<Reading>(br#"{"temp":"21"}"#).unwrap_err();
    assert!(matches!(err, JsonError::Unmarshaler { .. }));
    Ok(())
}

/// Dynamic values navigate by key and position.
#[test]
fn test_value_navigation() -> opjson::Result<()> {
    let v: Value = opjson::from_slice(br#"{"a":{"b":[true,"x",2]}}"#)?;
    assert_eq!(v["a"]["b"][0].as_bool(), Some(true));
    assert_eq!(v["a"]["b"][1].as_str(), Some("x"));
    assert_eq!(v["a"]["b"][2].as_i64(), Some(2));
    assert!(v["missing"].is_null());
    assert!(v.get("a").is_some());
    Ok(())
}

/// Trailing data after the value is a syntax error.
#[test]
fn test_trailing_data() {
    let err = opjson::from_slice::<Person>(br#"{"Name":"x"} {}"#).unwrap_err();
    assert!(matches!(err, JsonError::Syntax { offset: 13, .. }));
}

/// Reformatting helpers operate on raw text.
#[test]
fn test_reformat() -> opjson::Result<()> {
    assert!(opjson::valid(br#" {"a": [1, 2]} "#));
    assert!(!opjson::valid(br#"{"a": [1, 2]"#));
    assert!(!opjson::valid(b"1 2"));

    let mut out = Vec::new();
    opjson::compact(&mut out, b" { \"a\" : [ 1 , 2 ] } ")?;
    assert_eq!(out, br#"{"a":[1,2]}"#);
    Ok(())
}

/// Decoding straight from a memory-mapped file.
#[test]
#[cfg(not(target_arch = "wasm32"))]
fn test_from_file() -> opjson::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("inventory.json");
    let inv = create_inventory();
    std::fs::write(&path, opjson::to_vec_indent(&inv, "", "  ")?)?;

    let loaded: Inventory = opjson::from_file(&path)?;
    assert_eq!(loaded, inv);

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, b"")?;
    assert!(matches!(
        opjson::from_file::<Inventory, _>(&empty),
        Err(JsonError::Syntax { .. })
    ));

    let missing = opjson::from_file::<Inventory, _>(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(JsonError::Io(_))));
    Ok(())
}

/// Parallel batch encoding matches sequential encoding.
#[test]
fn test_batch() -> opjson::Result<()> {
    let people: Vec<Person> = (0..500)
        .map(|i| Person {
            name: format!("p{i}"),
            age: i,
        })
        .collect();
    let batch = Codec::default().to_vec_batch(&people)?;
    for (person, bytes) in people.iter().zip(&batch) {
        assert_eq!(bytes, &opjson::to_vec(person)?);
    }
    Ok(())
}
