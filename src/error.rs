use crate::events::ShardId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("shard {shard_id} is already attached")]
    DuplicateShard { shard_id: ShardId },
    #[error("IO error starting metrics collector {0}")]
    Io(#[from] std::io::Error),
}
