use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    fmt::Display,
};

use proptest::prelude::*;

use crate::{
    compact::{compact_len, Compact},
    de::{
        self, Deserializer, MapAccess, SeqAccess, StructAccess, TupleAccess,
    },
    ser::{self, Map, Seq, Serializer, Struct, Tuple},
    Bytes, Deserialize, Packed, Serialize, StructLayout,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Failure(String);

impl ser::Error for Failure {
    fn custom<T: Display>(msg: T) -> Self { Self(msg.to_string()) }
}

impl de::Error for Failure {
    fn custom<T: Display>(msg: T) -> Self { Self(msg.to_string()) }
}

/// A textual binding that records every call, with a separator between
/// members and an `end` event when a compound closes.
#[derive(Debug, Default)]
struct Recorder {
    events: Vec<String>,
}

impl Recorder {
    fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }
}

fn record<T: Serialize<Recorder> + ?Sized>(value: &T) -> Vec<String> {
    let mut recorder = Recorder::default();
    value.serialize(&mut recorder).unwrap();
    recorder.events
}

#[derive(Debug)]
struct Group<'s> {
    recorder: &'s mut Recorder,
    include_base: bool,
}

impl Drop for Group<'_> {
    fn drop(&mut self) { self.recorder.record("end"); }
}

impl Seq for Group<'_> {
    type Parent = Recorder;

    fn serialize_element<T: Serialize<Recorder> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Failure> {
        value.serialize(&mut *self.recorder)
    }
}

impl Tuple for Group<'_> {
    type Parent = Recorder;

    fn serialize_element<T: Serialize<Recorder> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Failure> {
        value.serialize(&mut *self.recorder)?;
        self.recorder.record("sep");
        Ok(())
    }

    fn serialize_last_element<T: Serialize<Recorder> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Failure> {
        value.serialize(&mut *self.recorder)
    }
}

impl Struct for Group<'_> {
    type Parent = Recorder;

    fn serialize_base<B: Serialize<Recorder> + ?Sized>(
        &mut self,
        base: &B,
    ) -> Result<(), Failure> {
        if !self.include_base {
            return Ok(());
        }

        self.recorder.record("base");
        base.serialize(&mut *self.recorder)
    }

    fn serialize_field<T: Serialize<Recorder> + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), Failure> {
        self.serialize_last_field(name, value)?;
        self.recorder.record("sep");
        Ok(())
    }

    fn serialize_last_field<T: Serialize<Recorder> + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), Failure> {
        self.recorder.record(format!("field {name}"));
        value.serialize(&mut *self.recorder)
    }
}

impl Map for Group<'_> {
    type Parent = Recorder;

    fn serialize_entry<
        K: Serialize<Recorder> + ?Sized,
        V: Serialize<Recorder> + ?Sized,
    >(
        &mut self,
        key: &K,
        value: &V,
    ) -> Result<(), Failure> {
        key.serialize(&mut *self.recorder)?;
        value.serialize(&mut *self.recorder)
    }
}

impl Serializer for Recorder {
    type Error = Failure;

    type Seq<'s>
        = Group<'s>
    where
        Self: 's;

    type Tuple<'s>
        = Group<'s>
    where
        Self: 's;

    type Struct<'s>
        = Group<'s>
    where
        Self: 's;

    type Map<'s>
        = Group<'s>
    where
        Self: 's;

    fn emit_bool(&mut self, value: bool) -> Result<(), Failure> {
        self.record(format!("bool {value}"));
        Ok(())
    }

    fn emit_u64(&mut self, value: u64) -> Result<(), Failure> {
        self.record(format!("u64 {value}"));
        Ok(())
    }

    fn emit_i64(&mut self, value: i64) -> Result<(), Failure> {
        self.record(format!("i64 {value}"));
        Ok(())
    }

    fn emit_f64(&mut self, value: f64) -> Result<(), Failure> {
        self.record(format!("f64 {value}"));
        Ok(())
    }

    fn emit_str(&mut self, value: &str) -> Result<(), Failure> {
        self.record(format!("str {value}"));
        Ok(())
    }

    fn emit_unit(&mut self) -> Result<(), Failure> {
        self.record("unit");
        Ok(())
    }

    fn emit_none(&mut self) -> Result<(), Failure> {
        self.record("none");
        Ok(())
    }

    fn emit_some<T: Serialize<Self> + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), Failure> {
        self.record("some");
        value.serialize(self)
    }

    fn emit_seq<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Seq<'s>) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        self.record(format!("seq {len}"));
        f(Group { recorder: self, include_base: true })
    }

    fn emit_map<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Map<'s>) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        self.record(format!("map {len}"));
        f(Group { recorder: self, include_base: true })
    }

    fn emit_tuple<'s>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        self.record(format!("tuple {len}"));
        f(Group { recorder: self, include_base: true })
    }

    fn emit_struct<'s>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::Struct<'s>) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        self.record(format!("struct {}", layout.name));
        f(Group { recorder: self, include_base: layout.include_base })
    }

    fn emit_variant<'s>(
        &'s mut self,
        name: &'static str,
        variant: &'static str,
        index: u32,
        _len: usize,
        f: impl FnOnce(Self::Tuple<'s>) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        self.record(format!("variant {name}::{variant} {index}"));
        f(Group { recorder: self, include_base: true })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Bool(bool),
    U64(u64),
    I64(i64),
    F64(f64),
    Str(&'static str),
    Unit,
    None,
    Some,
    Len(usize),
    Variant(u32),
}

/// A binding that replays a prepared token stream.
#[derive(Debug)]
struct Replay {
    tokens: VecDeque<Token>,
}

impl Replay {
    fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self { tokens: tokens.into_iter().collect() }
    }

    fn next(&mut self) -> Result<Token, Failure> {
        self.tokens
            .pop_front()
            .ok_or_else(|| Failure("unexpected end of input".to_owned()))
    }
}

fn unexpected(token: &Token) -> Failure {
    Failure(format!("unexpected token {token:?}"))
}

fn replay<T: Deserialize<Replay>>(
    tokens: impl IntoIterator<Item = Token>,
) -> Result<T, Failure> {
    let mut replay = Replay::new(tokens);
    let value = T::deserialize(&mut replay)?;
    assert!(replay.tokens.is_empty(), "leftover tokens {:?}", replay.tokens);

    Ok(value)
}

#[derive(Debug)]
struct Cursor<'s> {
    replay: &'s mut Replay,
    remaining: usize,
}

impl SeqAccess for Cursor<'_> {
    type Parent = Replay;

    fn next_element<T: Deserialize<Replay>>(
        &mut self,
    ) -> Result<Option<T>, Failure> {
        if self.remaining == 0 {
            return Ok(None);
        }

        self.remaining -= 1;
        T::deserialize(&mut *self.replay).map(Some)
    }

    fn size_hint(&self) -> Option<usize> { Some(self.remaining) }
}

impl TupleAccess for Cursor<'_> {
    type Parent = Replay;

    fn next_element<T: Deserialize<Replay>>(&mut self) -> Result<T, Failure> {
        T::deserialize(&mut *self.replay)
    }
}

impl StructAccess for Cursor<'_> {
    type Parent = Replay;

    fn next_base<B: Deserialize<Replay> + Default>(
        &mut self,
    ) -> Result<B, Failure> {
        B::deserialize(&mut *self.replay)
    }

    fn next_field<T: Deserialize<Replay>>(
        &mut self,
        _name: &'static str,
    ) -> Result<T, Failure> {
        T::deserialize(&mut *self.replay)
    }
}

impl MapAccess for Cursor<'_> {
    type Parent = Replay;

    fn next_entry<K: Deserialize<Replay>, V: Deserialize<Replay>>(
        &mut self,
    ) -> Result<Option<(K, V)>, Failure> {
        if self.remaining == 0 {
            return Ok(None);
        }

        self.remaining -= 1;
        let key = K::deserialize(&mut *self.replay)?;
        let value = V::deserialize(&mut *self.replay)?;

        Ok(Some((key, value)))
    }

    fn size_hint(&self) -> Option<usize> { Some(self.remaining) }
}

impl Deserializer for Replay {
    type Error = Failure;

    type SeqAccess<'s>
        = Cursor<'s>
    where
        Self: 's;

    type TupleAccess<'s>
        = Cursor<'s>
    where
        Self: 's;

    type StructAccess<'s>
        = Cursor<'s>
    where
        Self: 's;

    type MapAccess<'s>
        = Cursor<'s>
    where
        Self: 's;

    fn expect_bool(&mut self) -> Result<bool, Failure> {
        match self.next()? {
            Token::Bool(value) => Ok(value),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_u64(&mut self) -> Result<u64, Failure> {
        match self.next()? {
            Token::U64(value) => Ok(value),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_i64(&mut self) -> Result<i64, Failure> {
        match self.next()? {
            Token::I64(value) => Ok(value),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_f64(&mut self) -> Result<f64, Failure> {
        match self.next()? {
            Token::F64(value) => Ok(value),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_string(&mut self) -> Result<String, Failure> {
        match self.next()? {
            Token::Str(value) => Ok(value.to_owned()),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_unit(&mut self) -> Result<(), Failure> {
        match self.next()? {
            Token::Unit => Ok(()),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_option<T: Deserialize<Self>>(
        &mut self,
    ) -> Result<Option<T>, Failure> {
        match self.next()? {
            Token::None => Ok(None),
            Token::Some => T::deserialize(self).map(Some),
            token => Err(unexpected(&token)),
        }
    }

    fn expect_seq<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::SeqAccess<'s>) -> Result<R, Failure>,
    ) -> Result<R, Failure> {
        let remaining = match self.next()? {
            Token::Len(len) => len,
            token => return Err(unexpected(&token)),
        };

        f(Cursor { replay: self, remaining })
    }

    fn expect_map<'s, R>(
        &'s mut self,
        f: impl FnOnce(Self::MapAccess<'s>) -> Result<R, Failure>,
    ) -> Result<R, Failure> {
        let remaining = match self.next()? {
            Token::Len(len) => len,
            token => return Err(unexpected(&token)),
        };

        f(Cursor { replay: self, remaining })
    }

    fn expect_tuple<'s, R>(
        &'s mut self,
        len: usize,
        f: impl FnOnce(Self::TupleAccess<'s>) -> Result<R, Failure>,
    ) -> Result<R, Failure> {
        f(Cursor { replay: self, remaining: len })
    }

    fn expect_struct<'s, R>(
        &'s mut self,
        layout: &StructLayout,
        f: impl FnOnce(Self::StructAccess<'s>) -> Result<R, Failure>,
    ) -> Result<R, Failure> {
        f(Cursor { replay: self, remaining: layout.fields.len() })
    }

    fn expect_variant<'s, R>(
        &'s mut self,
        _name: &'static str,
        _variants: &'static [&'static str],
        f: impl FnOnce(u32, Self::TupleAccess<'s>) -> Result<R, Failure>,
    ) -> Result<R, Failure> {
        let index = match self.next()? {
            Token::Variant(index) => index,
            token => return Err(unexpected(&token)),
        };

        f(index, Cursor { replay: self, remaining: 1 })
    }
}

const POINT: StructLayout = StructLayout::new("Point", &["x", "y"]);
const POINT_3D: StructLayout = StructLayout::new("Point3D", &["z"]);
const FLAT_POINT_3D: StructLayout =
    StructLayout::new("Point3D", &["z"]).exclude_base();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Point {
    x: u32,
    y: u32,
}

impl<S: Serializer> Serialize<S> for Point {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_struct(&POINT, |mut fields| {
            fields.serialize_field("x", &self.x)?;
            fields.serialize_last_field("y", &self.y)
        })
    }
}

impl<D: Deserializer> Deserialize<D> for Point {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_struct(&POINT, |mut fields| {
            let x = fields.next_field("x")?;
            let y = fields.next_last_field("y")?;

            Ok(Self { x, y })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Point3D {
    base: Point,
    z: u32,
    layout: &'static StructLayout,
}

impl<S: Serializer> Serialize<S> for Point3D {
    fn serialize(&self, serializer: &mut S) -> Result<(), S::Error> {
        serializer.emit_struct(self.layout, |mut fields| {
            fields.serialize_base(&self.base)?;
            fields.serialize_last_field("z", &self.z)
        })
    }
}

impl<D: Deserializer> Deserialize<D> for Point3D {
    fn deserialize(deserializer: &mut D) -> Result<Self, D::Error> {
        deserializer.expect_struct(&POINT_3D, |mut fields| {
            let base = fields.next_base()?;
            let z = fields.next_last_field("z")?;

            Ok(Self { base, z, layout: &POINT_3D })
        })
    }
}

#[test]
fn narrow_widths_widen_to_64_bits() {
    assert_eq!(record(&5u8), ["u64 5"]);
    assert_eq!(record(&7usize), ["u64 7"]);
    assert_eq!(record(&-3i16), ["i64 -3"]);
    assert_eq!(record(&1.5f32), ["f64 1.5"]);
    assert_eq!(record(&'x'), ["str x"]);
}

#[test]
fn big_integers_are_opt_in() {
    let mut recorder = Recorder::default();

    let error = 1u128.serialize(&mut recorder).unwrap_err();
    assert_eq!(error.to_string(), "unsupported operation `u128`");
    assert!(i128::MIN.serialize(&mut recorder).is_err());
    assert!(recorder.events.is_empty());
}

#[test]
fn tuple_marks_last_member() {
    assert_eq!(record(&(1u8, true, "a")), [
        "tuple 3", "u64 1", "sep", "bool true", "sep", "str a", "end"
    ]);
    assert_eq!(record(&(9u8,)), ["tuple 1", "u64 9", "end"]);
}

#[test]
fn fixed_array_is_a_tuple() {
    assert_eq!(record(&[1u8, 2]), ["tuple 2", "u64 1", "sep", "u64 2", "end"]);
}

#[test]
fn struct_brackets_base_and_fields() {
    let value =
        Point3D { base: Point { x: 1, y: 2 }, z: 3, layout: &POINT_3D };

    assert_eq!(record(&value), [
        "struct Point3D",
        "base",
        "struct Point",
        "field x",
        "u64 1",
        "sep",
        "field y",
        "u64 2",
        "end",
        "field z",
        "u64 3",
        "end",
    ]);
}

#[test]
fn excluded_base_is_skipped() {
    let value =
        Point3D { base: Point { x: 1, y: 2 }, z: 3, layout: &FLAT_POINT_3D };

    assert_eq!(record(&value), ["struct Point3D", "field z", "u64 3", "end"]);
}

#[test]
fn result_is_a_variant() {
    assert_eq!(record(&Err::<u8, &str>("boom")), [
        "variant Result::Err 0",
        "str boom",
        "end"
    ]);
    assert_eq!(record(&Ok::<u8, &str>(4)), [
        "variant Result::Ok 1",
        "u64 4",
        "end"
    ]);
}

#[test]
fn option_and_unit() {
    assert_eq!(record(&Some(4u16)), ["some", "u64 4"]);
    assert_eq!(record(&None::<u16>), ["none"]);
    assert_eq!(record(&()), ["unit"]);
}

#[test]
fn fast_paths_fall_back_to_sequences() {
    assert_eq!(record(&Packed(vec![1u16, 2])), [
        "seq 2", "u64 1", "u64 2", "end"
    ]);
    assert_eq!(record(&Bytes(vec![9])), ["seq 1", "u64 9", "end"]);
}

#[test]
fn sets_and_maps() {
    let set = BTreeSet::from([3u8, 1]);
    assert_eq!(record(&set), ["seq 2", "u64 1", "u64 3", "end"]);

    let map = BTreeMap::from([(1u8, "a")]);
    assert_eq!(record(&map), ["map 1", "u64 1", "str a", "end"]);
}

#[test]
fn errors_are_messages() {
    let io = std::io::Error::other("disk full");
    assert_eq!(record(&io), ["str disk full"]);

    let boxed: Box<dyn std::error::Error + Send + Sync> = "bad input".into();
    assert_eq!(record(&boxed), ["str bad input"]);
}

#[test]
fn compact_goes_through_the_binding() {
    assert_eq!(record(&Compact(300u16)), ["u64 1201"]);
    assert_eq!(record(&Compact(1u8)), ["u64 4"]);
}

#[test]
fn compact_lengths() {
    let cases = [
        (0, 1),
        (63, 1),
        (64, 2),
        (16_383, 2),
        (16_384, 4),
        ((1 << 30) - 1, 4),
        (1 << 30, 5),
        (u64::from(u32::MAX), 5),
        (1 << 32, 6),
        ((1 << 56) - 1, 8),
        (1 << 56, 9),
        (u64::MAX, 9),
    ];

    for (value, len) in cases {
        assert_eq!(compact_len(value), len, "compact_len({value})");
    }
    assert_eq!(Compact(63u8).compact_len(), 1);
    assert_eq!(Compact::new(64u64).get(), 64);
}

#[test]
fn narrowing_is_checked() {
    assert_eq!(replay::<u8>([Token::U64(200)]).unwrap(), 200);
    assert_eq!(
        replay::<u8>([Token::U64(300)]).unwrap_err().to_string(),
        "300 does not fit in u8"
    );
    assert!(replay::<i8>([Token::I64(-129)]).is_err());
    assert_eq!(replay::<i32>([Token::I64(-129)]).unwrap(), -129);
    assert_eq!(replay::<f32>([Token::F64(1.5)]).unwrap(), 1.5);
}

#[test]
fn char_is_a_single_character_string() {
    assert_eq!(replay::<char>([Token::Str("x")]).unwrap(), 'x');
    assert!(replay::<char>([Token::Str("xy")]).is_err());
    assert!(replay::<char>([Token::Str("")]).is_err());
}

#[test]
fn collections() {
    assert_eq!(
        replay::<Vec<u32>>([Token::Len(2), Token::U64(5), Token::U64(6)])
            .unwrap(),
        [5, 6]
    );
    assert_eq!(
        replay::<[u8; 3]>([Token::U64(1), Token::U64(2), Token::U64(3)])
            .unwrap(),
        [1, 2, 3]
    );

    let map = replay::<HashMap<String, bool>>([
        Token::Len(1),
        Token::Str("on"),
        Token::Bool(true),
    ])
    .unwrap();
    assert_eq!(map.get("on"), Some(&true));
}

#[test]
fn huge_length_hint_is_not_preallocated() {
    let error =
        replay::<Vec<u8>>([Token::Len(usize::MAX), Token::U64(1)]).unwrap_err();

    assert_eq!(error.to_string(), "unexpected end of input");
}

#[test]
fn option_unit_and_tuples() {
    assert_eq!(
        replay::<Option<i64>>([Token::Some, Token::I64(-1)]).unwrap(),
        Some(-1)
    );
    assert_eq!(replay::<Option<i64>>([Token::None]).unwrap(), None);
    assert_eq!(
        replay::<(bool, (), String)>([
            Token::Bool(false),
            Token::Unit,
            Token::Str("t")
        ])
        .unwrap(),
        (false, (), "t".to_owned())
    );
}

#[test]
fn result_variants() {
    assert_eq!(
        replay::<Result<u8, String>>([Token::Variant(0), Token::Str("no")])
            .unwrap(),
        Err("no".to_owned())
    );
    assert_eq!(
        replay::<Result<u8, String>>([Token::Variant(1), Token::U64(1)])
            .unwrap(),
        Ok(1)
    );

    let mut replay = Replay::new([Token::Variant(2)]);
    let error = Result::<u8, String>::deserialize(&mut replay).unwrap_err();
    assert_eq!(error.to_string(), "unknown variant index 2 of `Result`");
}

#[test]
fn struct_with_base() {
    let value = replay::<Point3D>([Token::U64(1), Token::U64(2), Token::U64(3)])
        .unwrap();

    assert_eq!(value.base, Point { x: 1, y: 2 });
    assert_eq!(value.z, 3);
}

#[test]
fn io_error_from_message() {
    let error = replay::<std::io::Error>([Token::Str("gone")]).unwrap();

    assert_eq!(error.kind(), std::io::ErrorKind::Other);
    assert_eq!(error.to_string(), "gone");
}

proptest! {
    #[test]
    fn narrowing_matches_try_from(value in any::<u64>()) {
        let narrowed = replay::<u16>([Token::U64(value)]);

        prop_assert_eq!(narrowed.ok(), u16::try_from(value).ok());
    }

    #[test]
    fn compact_len_matches_mode_ranges(value in any::<u64>()) {
        let expected = match value {
            0..=0x3F => 1,
            0x40..=0x3FFF => 2,
            0x4000..=0x3FFF_FFFF => 4,
            _ => 1 + (64 - value.leading_zeros() as usize).div_ceil(8),
        };

        prop_assert_eq!(compact_len(value), expected);
    }
}
