// Lexer and parser: source text -> statement/expression tree

mod lexer;
mod parser;
mod token;

pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use crate::ast::Block;
use crate::lua_vm::LuaResult;

/// Tokenize and parse a chunk of Lua source.
pub fn parse(source: &str, chunk_name: &str) -> LuaResult<Block> {
    let tokens = Lexer::new(source, chunk_name).tokenize()?;
    Parser::new(tokens, chunk_name).parse_chunk()
}
