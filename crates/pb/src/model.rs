// rill.model.v1

/// A single string value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Str {
    #[prost(string, tag = "1")]
    pub value: ::prost::alloc::string::String,
}

/// A single 64-bit integer value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Int {
    #[prost(int64, tag = "1")]
    pub value: i64,
}

/// An ordered list of string values.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StrArray {
    #[prost(string, repeated, tag = "1")]
    pub value: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// An ordered list of 64-bit integer values.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntArray {
    #[prost(int64, repeated, tag = "1")]
    pub value: ::prost::alloc::vec::Vec<i64>,
}

/// One typed tag value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TagValue {
    #[prost(oneof = "tag_value::Value", tags = "1, 2, 3, 4, 5, 6")]
    pub value: ::core::option::Option<tag_value::Value>,
}

/// Nested message and enum types in `TagValue`.
pub mod tag_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(enumeration = "super::NullValue", tag = "1")]
        Null(i32),
        #[prost(message, tag = "2")]
        Str(super::Str),
        #[prost(message, tag = "3")]
        StrArray(super::StrArray),
        #[prost(message, tag = "4")]
        Int(super::Int),
        #[prost(message, tag = "5")]
        IntArray(super::IntArray),
        #[prost(bytes, tag = "6")]
        BinaryData(::prost::alloc::vec::Vec<u8>),
    }
}

/// The tag values of one tag family, in the family's declared tag order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TagFamilyForWrite {
    #[prost(message, repeated, tag = "1")]
    pub tags: ::prost::alloc::vec::Vec<TagValue>,
}

/// Identity of a stream within a group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(string, tag = "1")]
    pub group: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NullValue {
    NullValue = 0,
}

impl NullValue {
    /// String value of the enum field names used in the ProtoBuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            NullValue::NullValue => "NULL_VALUE",
        }
    }
}
