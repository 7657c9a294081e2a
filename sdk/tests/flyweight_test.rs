#![cfg(test)]

use brine_wire::{
    compile_schema, decode, encode, to_json, Builder, Flyweight, FlyweightError, Input, Plan, Value,
    WireError,
};
use serde_json::json;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn plan(schema: &str) -> Plan {
    init_logging();
    compile_schema(schema).expect("compile_schema failed").1
}

#[test]
fn test_fixed_struct_size_is_sum_of_widths() {
    let plan = plan("struct Fixed { int8 a; uint16 b; int24 c; uint32 d; int64 e; }");
    let mut bytes = [0u8; 32];
    let mut builder = Builder::new(&plan, "Fixed").unwrap();
    builder.wrap(&mut bytes, 0, 32).unwrap();
    builder
        .set("a", -1i8)
        .unwrap()
        .set("b", 65535u16)
        .unwrap()
        .set("c", -8_388_608i32)
        .unwrap()
        .set("d", 7u32)
        .unwrap()
        .set("e", i64::MIN)
        .unwrap();
    let fixed = builder.build().unwrap();
    assert_eq!(fixed.limit(), 1 + 2 + 3 + 4 + 8);
    assert_eq!(fixed.get_int("a"), Ok(-1));
    assert_eq!(fixed.get_uint("b"), Ok(65535));
    assert_eq!(fixed.get_int("c"), Ok(-8_388_608));
    assert_eq!(fixed.get_uint("d"), Ok(7));
    assert_eq!(fixed.get_int("e"), Ok(i64::MIN));
}

#[test]
fn test_skipped_members_read_back_as_defaults() {
    let plan = plan(
        r#"
        enum Side { BUY, SELL }
        struct Order {
            int32 id;
            int16 n;
            octets data[n] = null;
            string8 note = null;
            varint32 qty = 12;
            Side side = SELL;
        }
        "#,
    );
    let mut bytes = [0u8; 32];
    let mut builder = Builder::new(&plan, "Order").unwrap();
    builder.wrap(&mut bytes, 0, 32).unwrap();
    builder.set("id", 42).unwrap();
    let order = builder.build().unwrap();

    // id, n, no data, null note, qty, side
    assert_eq!(order.limit(), 4 + 2 + 0 + 1 + 1 + 1);
    assert_eq!(order.get_int("id"), Ok(42));
    assert_eq!(order.get_int("n"), Ok(-1));
    assert_eq!(order.get_bytes("data"), Ok(None));
    assert_eq!(order.get_str("note"), Ok(None));
    assert_eq!(order.get_int("qty"), Ok(12));
    assert_eq!(order.get("side"), Ok(Value::Enum("Side", "SELL")));
    assert_eq!(
        order.to_string(),
        r#"Order {id: 42, n: -1, data: null, note: null, qty: 12, side: Side::SELL}"#
    );
}

#[test]
fn test_varint_encoding() {
    let plan = plan("struct V { varint32 a; varint32 b; }");
    let mut bytes = [0u8; 8];
    let input = Input::fields([("a", Input::Int(12)), ("b", Input::Int(-66))]);
    let limit = encode(&plan, "V", &input, &mut bytes, 0, 8).unwrap();
    assert_eq!(&bytes[..limit], &[0x18, 0x83, 0x01]);

    let plan = self::plan("struct W { varint32 a; varint64 b; }");
    for (a, b) in [(i32::MIN, i64::MIN), (i32::MAX, i64::MAX), (0, -1), (-1, 1 << 40)] {
        let mut bytes = [0u8; 16];
        let input = Input::fields([("a", Input::from(a)), ("b", Input::from(b))]);
        let limit = encode(&plan, "W", &input, &mut bytes, 0, 16).unwrap();
        let value = decode(&plan, "W", &bytes, 0, limit).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Int(a as i64)));
        assert_eq!(value.get("b"), Some(&Value::Int(b)));
    }

    let mut bytes = [0u8; 16];
    let wide = Input::fields([("a", Input::Int(1 << 31)), ("b", Input::Int(0))]);
    assert!(matches!(
        encode(&plan, "W", &wide, &mut bytes, 0, 16),
        Err(FlyweightError::Wire(WireError::ExceedsBits { bits: 32, .. }))
    ));
}

#[test]
fn test_members_are_set_in_order() {
    let plan = plan("struct ABC { int8 A; int8 B; int8 C; }");
    let mut bytes = [0u8; 8];
    let mut builder = Builder::new(&plan, "ABC").unwrap();
    builder.wrap(&mut bytes, 0, 8).unwrap();

    assert_eq!(builder.set("B", 2).err(), Some(FlyweightError::RequiredFieldNotSet("A".into())));
    assert_eq!(builder.limit(), 0);
    builder.set("A", 1).unwrap();
    assert_eq!(builder.set("A", 1).err(), Some(FlyweightError::AlreadySet("A".into())));
    assert!(builder.set("C", 3).is_err());
    assert_eq!(builder.build().err(), Some(FlyweightError::RequiredFieldNotSet("B".into())));
}

#[test]
fn test_out_of_bounds_leaves_memory_untouched() {
    let plan = plan("struct S { int32 a; string8 s; }");
    let mut bytes = [0xaau8; 16];
    let mut builder = Builder::new(&plan, "S").unwrap();
    builder.wrap(&mut bytes, 0, 6).unwrap();
    builder.set("a", 1).unwrap();
    assert_eq!(
        builder.set("s", "hello").err(),
        Some(FlyweightError::OutOfBounds {
            field:     "s".into(),
            limit:     10,
            max_limit: 6,
        })
    );
    assert_eq!(builder.limit(), 4);
    assert!(bytes[4..].iter().all(|b| *b == 0xaa));

    let mut bytes = [0xaau8; 4];
    let mut builder = Builder::new(&plan, "S").unwrap();
    builder.wrap(&mut bytes, 0, 2).unwrap();
    assert!(matches!(
        builder.set("a", 1).err(),
        Some(FlyweightError::OutOfBounds { limit: 4, max_limit: 2, .. })
    ));
    assert_eq!(bytes, [0xaa; 4]);
}

#[test]
fn test_array_items_read_back_in_order() {
    let plan = plan("struct Series { uint8 count; varint32 deltas[count]; array32<varint32> values; }");
    let mut bytes = [0u8; 32];
    let mut builder = Builder::new(&plan, "Series").unwrap();
    builder.wrap(&mut bytes, 0, 32).unwrap();
    builder
        .set("deltas", vec![5i32, -5])
        .unwrap()
        .set("values", vec![1i32, -1, 12])
        .unwrap();
    let series = builder.build().unwrap();

    assert_eq!(series.get_uint("count"), Ok(2));
    assert_eq!(series.member_range("values"), Ok((3, 3 + 4 + 3)));
    assert_eq!(series.limit(), 10);
    assert_eq!(
        series.get("values"),
        Ok(Value::Array(vec![Value::Int(1), Value::Int(-1), Value::Int(12)]))
    );

    let mut deltas = Vec::new();
    let items = series
        .for_each_item("deltas", |item| {
            deltas.push(item.as_int().unwrap_or_default());
            Ok(())
        })
        .unwrap();
    assert_eq!(items, 2);
    assert_eq!(deltas, vec![5, -5]);
}

#[test]
fn test_null_and_empty_are_distinct() {
    let plan = plan("struct Blob { int16 n; octets data[n] = null; string8 text = null; }");
    let mut bytes = [0u8; 16];
    let mut builder = Builder::new(&plan, "Blob").unwrap();
    builder.wrap(&mut bytes, 0, 16).unwrap();

    builder.set_null("data").unwrap().set("text", "").unwrap();
    {
        let blob = builder.build().unwrap();
        assert_eq!(blob.member_range("data"), Ok((2, 2)));
        assert_eq!(blob.get_bytes("data"), Ok(None));
        assert_eq!(blob.is_present("data"), Ok(false));
        assert_eq!(blob.get_str("text"), Ok(Some("")));
        assert_eq!(blob.is_present("text"), Ok(true));
    }

    // The builder is reusable after build.
    builder.set("data", b"").unwrap();
    let blob = builder.build().unwrap();
    assert_eq!(blob.get_int("n"), Ok(0));
    assert_eq!(blob.get_bytes("data"), Ok(Some(&b""[..])));
    assert_eq!(blob.get_str("text"), Ok(None));
}

#[test]
fn test_null_string_is_the_all_ones_prefix() {
    let plan = plan("struct Note { uint8 a; string8 text = null; }");
    let mut bytes = [0u8; 8];
    let mut builder = Builder::new(&plan, "Note").unwrap();
    builder.wrap(&mut bytes, 0, 8).unwrap();

    builder.set("a", 1u8).unwrap().set_null("text").unwrap();
    {
        let note = builder.build().unwrap();
        assert_eq!(note.member_range("text"), Ok((1, 2)));
        assert_eq!(note.get_str("text"), Ok(None));
        assert_eq!(note.is_present("text"), Ok(false));
    }

    builder.set("a", 1u8).unwrap().set("text", "").unwrap();
    {
        let note = builder.build().unwrap();
        assert_eq!(note.member_range("text"), Ok((1, 2)));
        assert_eq!(note.get_str("text"), Ok(Some("")));
        assert_eq!(note.is_present("text"), Ok(true));
    }
    assert_eq!(&bytes[..2], &[1, 0x00]);

    let mut out = [0u8; 4];
    let null = Input::fields([("a", Input::Int(1)), ("text", Input::Null)]);
    assert_eq!(encode(&plan, "Note", &null, &mut out, 0, 4), Ok(2));
    assert_eq!(&out[..2], &[1, 0xff]);
}

#[test]
fn test_fixed_octets_default_to_zeros() {
    let plan = plan("struct S { octets o[4]; int8 x; }");
    let mut bytes = [0xAAu8; 8];
    let mut builder = Builder::new(&plan, "S").unwrap();
    builder.wrap(&mut bytes, 0, 8).unwrap();
    builder.set("x", 1i8).unwrap();
    {
        let s = builder.build().unwrap();
        assert_eq!(s.limit(), 5);
        assert_eq!(s.get_bytes("o"), Ok(Some(&[0u8; 4][..])));
        assert_eq!(s.get_int("x"), Ok(1));
    }
    assert_eq!(bytes, [0, 0, 0, 0, 1, 0xAA, 0xAA, 0xAA]);

    let mut out = [0xAAu8; 6];
    let input = Input::fields([("x", Input::Int(1))]);
    assert_eq!(encode(&plan, "S", &input, &mut out, 0, 6), Ok(5));
    assert_eq!(out, [0, 0, 0, 0, 1, 0xAA]);
}

#[test]
fn test_size_field_inherited_from_supertype() {
    let plan = plan("struct A { uint8 n; } struct B extends A { octets d[n]; }");
    let mut bytes = [0u8; 8];
    let mut builder = Builder::new(&plan, "B").unwrap();
    builder.wrap(&mut bytes, 0, 8).unwrap();
    assert_eq!(builder.set("n", 2u8).err(), Some(FlyweightError::SizeField("n".into())));
    builder.set("d", b"ab").unwrap();
    {
        let b = builder.build().unwrap();
        assert_eq!(b.limit(), 3);
        assert_eq!(b.get_uint("n"), Ok(2));
        assert_eq!(b.get_bytes("d"), Ok(Some(&b"ab"[..])));
    }
    assert_eq!(&bytes[..3], &[2, b'a', b'b']);

    let decoded = decode(&plan, "B", &[1, b'z', 9], 0, 3).unwrap();
    assert_eq!(decoded.get("d"), Some(&Value::Octets(&b"z"[..])));

    let mut base = [0u8; 1];
    let mut builder = Builder::new(&plan, "A").unwrap();
    builder.wrap(&mut base, 0, 1).unwrap();
    builder.set("n", 5u8).unwrap();
    assert_eq!(builder.build().map(|a| a.limit()), Ok(1));
}

#[test]
fn test_offsets_past_the_address_space_fail_cleanly() {
    let plan = plan("struct S { string8 s; }");
    let bytes = [0u8; 4];
    assert!(matches!(
        decode(&plan, "S", &bytes, usize::MAX, 4),
        Err(FlyweightError::Wire(WireError::Truncated { .. }))
    ));
    let mut view = Flyweight::new(&plan, "S").unwrap();
    assert!(view.wrap(&bytes, usize::MAX - 1, 4).is_err());

    let mut out = [0xAAu8; 4];
    let input = Input::fields([("s", Input::Str("hi"))]);
    assert!(matches!(
        encode(&plan, "S", &input, &mut out, usize::MAX, 4),
        Err(FlyweightError::Wire(WireError::OutOfBounds { .. }))
    ));
    assert_eq!(out, [0xAA; 4]);
}

const QUOTES: &str = r#"
    variant Price switch (uint8) {
        case 0x40: missing;
        case 0x41: int8;
        case 0x42: int32;
    }

    list<uint8, uint8> Quote {
        required int64 bid;
        int64 ask = 0;
        Price last;
    }
"#;

#[test]
fn test_list_header_and_absent_members() {
    let plan = plan(QUOTES);
    let mut bytes = [0u8; 32];
    let mut builder = Builder::new(&plan, "Quote").unwrap();
    builder.wrap(&mut bytes, 0, 32).unwrap();

    assert_eq!(builder.build().err(), Some(FlyweightError::RequiredFieldNotSet("bid".into())));

    builder.set("bid", 100).unwrap();
    {
        let quote = builder.build().unwrap();
        assert_eq!(quote.limit(), 2 + 8);
        assert_eq!(quote.get_int("bid"), Ok(100));
        assert_eq!(quote.get_int("ask"), Ok(0));
        assert_eq!(quote.is_present("ask"), Ok(false));
        assert_eq!(quote.get("last"), Ok(Value::Null));
    }

    builder.set("bid", 100).unwrap().set("last", 5).unwrap();
    let quote = builder.build().unwrap();
    assert_eq!(quote.limit(), 2 + 8 + 8 + 2);
    assert_eq!(quote.as_bytes().unwrap()[..2], [19, 3]);
    assert_eq!(quote.is_present("ask"), Ok(true));
    assert_eq!(quote.get("last"), Ok(Value::Case("Price", 0x41, Box::new(Value::Int(5)))));
    assert_eq!(quote.to_string(), "Quote {bid: 100, ask: 0, last: Price(65: 5)}");
}

#[test]
fn test_missing_variant_case_reads_as_absent() {
    let plan = plan(QUOTES);
    let input = Input::fields([("bid", Input::Int(1)), ("last", Input::Null)]);
    let mut bytes = [0u8; 32];
    let limit = encode(&plan, "Quote", &input, &mut bytes, 0, 32).unwrap();
    assert_eq!(limit, 2 + 8 + 8 + 1);

    let mut quote = Flyweight::new(&plan, "Quote").unwrap();
    quote.wrap(&bytes, 0, limit).unwrap();
    assert_eq!(quote.is_present("last"), Ok(false));
    assert_eq!(quote.get("last"), Ok(Value::Case("Price", 0x40, Box::new(Value::Null))));
}

const NESTED: &str = r#"
    struct Inner { int8 x; string8 tag; }
    struct Outer { uint8 id; Inner inner; int8 tail = 3; }
"#;

#[test]
fn test_nested_builder() {
    let plan = plan(NESTED);
    let mut bytes = [0u8; 16];
    let mut builder = Builder::new(&plan, "Outer").unwrap();
    builder.wrap(&mut bytes, 0, 16).unwrap();
    builder.set("id", 1u8).unwrap();

    let err = builder
        .set_with("inner", |inner| {
            inner.set("tag", "t")?;
            Ok(())
        })
        .err();
    assert_eq!(err, Some(FlyweightError::RequiredFieldNotSet("x".into())));
    assert_eq!(builder.limit(), 1);

    builder
        .set_with("inner", |inner| {
            inner.set("x", 5i8)?.set("tag", "t")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(builder.limit(), 1 + 1 + 2);
    let outer = builder.build().unwrap();
    assert_eq!(outer.limit(), 5);
    assert_eq!(outer.get_int("tail"), Ok(3));

    let mut inner = Flyweight::new(&plan, "Inner").unwrap();
    assert_eq!(outer.wrap_member("inner", &mut inner), Ok(4));
    assert_eq!(inner.get_int("x"), Ok(5));
    assert_eq!(inner.get_str("tag"), Ok(Some("t")));

    let mut wrong = Flyweight::new(&plan, "Outer").unwrap();
    assert!(matches!(
        outer.wrap_member("inner", &mut wrong),
        Err(FlyweightError::TypeMismatch { .. })
    ));
}

#[test]
fn test_copy_from_view_and_raw_bytes() {
    let plan = plan(NESTED);
    let mut source = [0u8; 8];
    let inner_input = Input::fields([("x", Input::Int(-2)), ("tag", Input::Str("ab"))]);
    let inner_limit = encode(&plan, "Inner", &inner_input, &mut source, 0, 8).unwrap();
    let mut inner = Flyweight::new(&plan, "Inner").unwrap();
    inner.wrap(&source, 0, inner_limit).unwrap();

    let mut bytes = [0u8; 16];
    let mut builder = Builder::new(&plan, "Outer").unwrap();
    builder.wrap(&mut bytes, 0, 16).unwrap();
    builder.set("id", 9u8).unwrap().set_from("inner", &inner).unwrap();
    let outer = builder.build().unwrap();
    assert_eq!(
        outer.to_string(),
        r#"Outer {id: 9, inner: Inner {x: -2, tag: "ab"}, tail: 3}"#
    );
}

#[test]
fn test_raw_bytes_fill_size_fields() {
    let plan = plan("struct Raw { uint8 n; octets data[n]; uint8 m; int16 items[m]; }");
    let mut bytes = [0u8; 16];
    let mut builder = Builder::new(&plan, "Raw").unwrap();
    builder.wrap(&mut bytes, 0, 16).unwrap();
    builder.set_raw("data", b"xyz").unwrap();
    assert!(matches!(
        builder.set_raw("items", &[1, 0, 2]).err(),
        Some(FlyweightError::Wire(_))
    ));
    builder.set_raw("items", &[1, 0, 2, 0]).unwrap();
    let raw = builder.build().unwrap();
    assert_eq!(raw.get_uint("n"), Ok(3));
    assert_eq!(raw.get_bytes("data"), Ok(Some(&b"xyz"[..])));
    assert_eq!(raw.get_uint("m"), Ok(2));
    assert_eq!(raw.limit(), 1 + 3 + 1 + 4);
}

#[test]
fn test_size_fields_cannot_be_set() {
    let plan = plan("struct Raw { uint8 n; octets data[n]; }");
    let mut bytes = [0u8; 8];
    let mut builder = Builder::new(&plan, "Raw").unwrap();
    builder.wrap(&mut bytes, 0, 8).unwrap();
    assert_eq!(builder.set("n", 1u8).err(), Some(FlyweightError::SizeField("n".into())));
}

#[test]
fn test_unknown_union_kind() {
    let plan = plan(
        r#"
        union Shape switch (uint8) { case 1: uint8 circle; case 2: string8 label; }
        struct Holder { Shape shape; uint8 after; }
        "#,
    );
    let bytes = [9u8, 0, 0];

    let mut shape = Flyweight::new(&plan, "Shape").unwrap();
    assert_eq!(shape.wrap(&bytes, 0, 3), Ok(1));
    assert_eq!(shape.kind(), Ok(9));
    assert_eq!(shape.value(), Ok(Value::Unknown("Shape", 9)));
    assert_eq!(shape.to_string(), "unknown");
    assert_eq!(shape.get("circle"), Ok(Value::Null));

    let mut holder = Flyweight::new(&plan, "Holder").unwrap();
    assert!(matches!(
        holder.wrap(&bytes, 0, 3),
        Err(FlyweightError::Wire(WireError::UnknownKind { kind: 9, .. }))
    ));
    assert_eq!(holder.get("after").err(), Some(FlyweightError::NotWrapped));
}

#[test]
fn test_truncated_message_fails_to_wrap() {
    let plan = plan("struct S { int32 a; string8 s; }");
    let bytes = [1u8, 0, 0, 0, 5, b'h', b'i'];
    let mut view = Flyweight::new(&plan, "S").unwrap();
    assert!(matches!(view.wrap(&bytes, 0, bytes.len()), Err(FlyweightError::Wire(_))));
    assert_eq!(view.get_int("a").err(), Some(FlyweightError::NotWrapped));
}

#[test]
fn test_map_to_json() {
    let plan = plan(
        r#"
        enum Side { BUY, SELL }
        struct Level { Side side; varint32 size; }
        map Book map8<string8, Level>;
        "#,
    );
    let input = Input::Entries(vec![
        (
            Input::Str("a"),
            Input::fields([("side", Input::Symbol("BUY")), ("size", Input::Int(3))]),
        ),
        (
            Input::Str("b"),
            Input::fields([("side", Input::Symbol("SELL")), ("size", Input::Int(-1))]),
        ),
    ]);
    let mut bytes = [0u8; 32];
    let limit = encode(&plan, "Book", &input, &mut bytes, 0, 32).unwrap();
    // header, then two entries of key (2) and level (2)
    assert_eq!(limit, 2 + 2 * (2 + 2));
    assert_eq!(bytes[..2], [9, 4]);

    let book = decode(&plan, "Book", &bytes, 0, limit).unwrap();
    assert_eq!(
        to_json(&book),
        json!([
            { "key": "a", "value": { "side": "BUY", "size": 3 } },
            { "key": "b", "value": { "side": "SELL", "size": -1 } }
        ])
    );
}
