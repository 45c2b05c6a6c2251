pub mod channels;
pub mod envelope;
pub mod topics;

pub use channels::*;
pub use envelope::*;
pub use topics::TopicError;
