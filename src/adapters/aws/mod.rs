pub mod dynamodb;
pub mod s3;
pub mod sqs;

pub use dynamodb::DynamoMetadata;
pub use s3::{S3Content, S3Uploads};
pub use sqs::SqsQueue;
