pub mod yaml;

pub use yaml::{build_query, parse_yaml_query, QueryBuilder, QueryDoc};
