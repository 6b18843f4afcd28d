mod test_basic;
mod test_env;
mod test_functions;
mod test_scope;
mod test_stdlib;
mod test_syntax;
mod test_table;
