//! AWS request parsing for the AWS request proxy.
//!
//! Turns a raw HTTP request into an operation name plus a normalized
//! parameter map, for the three wire protocols the proxy understands:
//!
//! - `awsJson` (DynamoDB, SQS, Secrets Manager, ...): operation from the
//!   `X-Amz-Target` header, parameters from the JSON body.
//! - `awsQuery` (SQS query mode, SNS, STS, IAM, CloudWatch, ...): operation
//!   from the `Action` form field, parameters from the remaining fields.
//! - S3 `restXml`: operation from method, path, and sub-resource query keys;
//!   `Bucket`/`Key` from the path or virtual host.
//!
//! Top-level `null` parameters are dropped. Streaming S3 uploads framed as
//! `aws-chunked` are decoded by [`chunked`].

pub mod chunked;
pub mod error;
mod json;
pub mod parser;
mod query;
pub mod s3;

pub use chunked::{DecodedChunks, decode_aws_chunked, is_aws_chunked};
pub use error::ProtocolError;
pub use parser::{AwsRequestParser, ParsedRequest, Protocol, RequestParser};
