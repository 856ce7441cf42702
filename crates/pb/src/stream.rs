// rill.stream.v1

/// One stream record as submitted by a client.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ElementValue {
    /// Identity of the element within its series; unique only together with
    /// the series.
    #[prost(string, tag = "1")]
    pub element_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub timestamp: ::core::option::Option<::prost_types::Timestamp>,
    /// Tag families in the stream schema's declared order. Trailing families
    /// may be omitted.
    #[prost(message, repeated, tag = "3")]
    pub tag_families: ::prost::alloc::vec::Vec<super::model::TagFamilyForWrite>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteRequest {
    #[prost(message, optional, tag = "1")]
    pub metadata: ::core::option::Option<super::model::Metadata>,
    #[prost(message, optional, tag = "2")]
    pub element: ::core::option::Option<ElementValue>,
    #[prost(uint64, tag = "3")]
    pub message_id: u64,
}

/// A write request after the routing layer has resolved its shard and series
/// identity.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InternalWriteRequest {
    #[prost(uint32, tag = "1")]
    pub shard_id: u32,
    /// Tag values forming the series identity, in entity declaration order.
    #[prost(message, repeated, tag = "2")]
    pub entity_values: ::prost::alloc::vec::Vec<super::model::TagValue>,
    #[prost(message, optional, tag = "3")]
    pub request: ::core::option::Option<WriteRequest>,
}
