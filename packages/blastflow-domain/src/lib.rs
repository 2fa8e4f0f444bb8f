pub mod frame;
pub mod hit;
pub mod partition;
pub mod request;
pub mod traceback;

pub use frame::{FRAME_PREFIX, FRAME_TERMINATOR, FramedResult};
pub use hit::{Cutoff, ScoredHit};
pub use partition::{PartitionCatalog, PartitionDescriptor};
pub use request::{PROTOCOL_VERSION, RejectCode, Rejection, Request};
pub use traceback::{TracebackRecord, significance_order};
