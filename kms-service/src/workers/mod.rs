mod feed;

pub use feed::{ChangeFeedHandle, ChangeFeedWorker};
