pub mod common;

mod token_flow;
