pub mod metadata;

/// Wire contract of the `delta.Coordination` gRPC service.
pub mod proto {
    include!("proto/delta.rs");
}
