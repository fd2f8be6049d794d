#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod composer;
pub mod config;
pub mod corpus;
pub mod error;
pub mod records;
pub mod traits;
pub mod types;
