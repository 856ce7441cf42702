//! Tag value encoding: the packed byte representation tags take in column
//! storage, and their projection into typed index fields.

use anyhow::Context;

use crate::index::{
    FieldKey,
    FieldValue,
    IndexField,
};

/// Declared type of a tag in the stream schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagType {
    Int,
    Str,
    Binary,
    IntArray,
    StrArray,
}

impl Default for TagType {
    fn default() -> Self {
        TagType::Str
    }
}

/// A decoded tag value as it arrives on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TagValue {
    #[default]
    Null,
    Int(i64),
    Str(String),
    Binary(Vec<u8>),
    IntArray(Vec<i64>),
    StrArray(Vec<String>),
}

impl TagValue {
    /// Decode the protobuf representation. An absent oneof is a null.
    pub fn from_pb(pb: &pb::model::TagValue) -> TagValue {
        use pb::model::tag_value::Value;
        match &pb.value {
            None | Some(Value::Null(_)) => TagValue::Null,
            Some(Value::Int(v)) => TagValue::Int(v.value),
            Some(Value::Str(v)) => TagValue::Str(v.value.clone()),
            Some(Value::BinaryData(b)) => TagValue::Binary(b.clone()),
            Some(Value::IntArray(v)) => TagValue::IntArray(v.value.clone()),
            Some(Value::StrArray(v)) => TagValue::StrArray(v.value.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }
}

/// One tag in its packed storage representation. Scalars populate `value`,
/// arrays populate `value_arr`; a null leaves both empty. `indexed` marks
/// tags covered by a skipping rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedTag {
    pub name: String,
    pub value_type: TagType,
    pub value: Option<Vec<u8>>,
    pub value_arr: Option<Vec<Vec<u8>>>,
    pub indexed: bool,
}

/// All the stored tags of one family, in schema order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedTagFamily {
    pub name: String,
    pub tags: Vec<EncodedTag>,
}

/// Order-preserving encoding: flipping the sign bit makes the big-endian
/// byte order match the numeric order.
pub fn encode_int(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

pub fn decode_int(b: &[u8]) -> anyhow::Result<i64> {
    let raw: [u8; 8] = b.try_into().context("int tag value must be 8 bytes")?;
    Ok((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

/// Pack `value` into its storage representation per the schema-declared
/// `ty`. Schema agreement is the caller's responsibility; a value of the
/// wrong shape aborts, it is not an input error.
pub fn encode_tag_value(name: &str, ty: TagType, value: &TagValue) -> EncodedTag {
    let mut tag = EncodedTag {
        name: name.to_string(),
        value_type: ty,
        value: None,
        value_arr: None,
        indexed: false,
    };
    match (ty, value) {
        (_, TagValue::Null) => {},
        (TagType::Int, TagValue::Int(v)) => tag.value = Some(encode_int(*v).to_vec()),
        (TagType::Str, TagValue::Str(s)) => tag.value = Some(s.as_bytes().to_vec()),
        (TagType::Binary, TagValue::Binary(b)) => tag.value = Some(b.clone()),
        (TagType::IntArray, TagValue::IntArray(vs)) => {
            tag.value_arr = Some(vs.iter().map(|v| encode_int(*v).to_vec()).collect());
        },
        (TagType::StrArray, TagValue::StrArray(ss)) => {
            tag.value_arr = Some(ss.iter().map(|s| s.as_bytes().to_vec()).collect());
        },
        _ => panic!("tag {name} expects {ty:?}, got {value:?}"),
    }
    tag
}

/// Inverse of [`encode_tag_value`], used by downstream readers and to verify
/// the packed form is lossless.
pub fn decode_tag_value(tag: &EncodedTag) -> anyhow::Result<TagValue> {
    if tag.value.is_none() && tag.value_arr.is_none() {
        return Ok(TagValue::Null);
    }
    let value = match (tag.value_type, &tag.value, &tag.value_arr) {
        (TagType::Int, Some(b), _) => TagValue::Int(decode_int(b)?),
        (TagType::Str, Some(b), _) => {
            TagValue::Str(String::from_utf8(b.clone()).context("string tag is not UTF-8")?)
        },
        (TagType::Binary, Some(b), _) => TagValue::Binary(b.clone()),
        (TagType::IntArray, _, Some(arr)) => TagValue::IntArray(
            arr.iter()
                .map(|b| decode_int(b))
                .collect::<anyhow::Result<_>>()?,
        ),
        (TagType::StrArray, _, Some(arr)) => TagValue::StrArray(
            arr.iter()
                .map(|b| String::from_utf8(b.clone()).context("string tag is not UTF-8"))
                .collect::<Result<_, _>>()?,
        ),
        _ => anyhow::bail!(
            "tag {} has type {:?} but a mismatched payload shape",
            tag.name,
            tag.value_type
        ),
    };
    Ok(value)
}

/// Project a tag value into index fields under `key`. Arrays fan out into
/// one field per element; nulls contribute nothing. As with
/// [`encode_tag_value`], a value that disagrees with the declared type
/// aborts.
pub fn append_index_fields(
    dest: &mut Vec<IndexField>,
    key: &FieldKey,
    ty: TagType,
    value: &TagValue,
    no_sort: bool,
) {
    let mut push = |value: FieldValue| {
        dest.push(IndexField {
            key: key.clone(),
            value,
            no_sort,
        })
    };
    match (ty, value) {
        (_, TagValue::Null) => {},
        (TagType::Int, TagValue::Int(v)) => push(FieldValue::Int(*v)),
        (TagType::Str, TagValue::Str(s)) => push(FieldValue::Str(s.clone())),
        (TagType::Binary, TagValue::Binary(b)) => push(FieldValue::Bytes(b.clone())),
        (TagType::IntArray, TagValue::IntArray(vs)) => {
            for v in vs {
                push(FieldValue::Int(*v));
            }
        },
        (TagType::StrArray, TagValue::StrArray(ss)) => {
            for s in ss {
                push(FieldValue::Str(s.clone()));
            }
        },
        _ => panic!("index field under {ty:?} cannot be built from {value:?}"),
    }
}
