pub mod error;
pub mod tape;
pub mod program;
pub mod decode;
pub mod port;
pub mod machine;
pub mod arcade;
pub mod pipeline;
pub mod phases;
