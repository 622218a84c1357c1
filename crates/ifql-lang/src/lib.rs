//! ifql-lang: source text to operation graph.
//!
//! Three stages live here: the logos lexer, a hand-written recursive
//! descent parser (binary operators are left-folded `head (op tail)*`
//! loops, never runtime left recursion), and the query builder, which
//! walks a `Program` with a variable environment and a `FunctionRegistry`
//! to produce a `QuerySpec`.

pub mod builder;
pub mod parser;
pub mod token;

pub use builder::{
    build_query, ArgValue, Arguments, BuilderContext, CreateOperationSpec, FunctionRegistry,
};
pub use parser::{parse, ParseError};
pub use token::Token;
