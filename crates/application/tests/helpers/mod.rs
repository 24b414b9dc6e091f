#![allow(dead_code)]
#![allow(unused_imports)]

mod messages;
mod mock_upstream;

pub use messages::*;
pub use mock_upstream::*;
