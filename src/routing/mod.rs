pub mod encoder;

pub use encoder::{
    encode_multi_trip, encode_single_trip, reload_count, EncodeInput, LocationKind, RoutingProblem,
    UNREACHABLE_M,
};
