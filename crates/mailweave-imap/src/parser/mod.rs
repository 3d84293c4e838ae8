//! Sans-I/O response parsing.
//!
//! The lexer tokenizes raw bytes; the response parser assembles tokens into
//! typed tagged/untagged/continuation responses. Neither performs I/O.

pub mod lexer;
mod response;

pub use response::{
    Address, BodyStructure, ESearchResponse, Envelope, FetchItem, Response, ResponseParser,
    StatusItem, ThreadNode, UntaggedResponse,
};
