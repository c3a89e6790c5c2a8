pub mod dispatcher;
pub mod input;
pub mod resolver;
