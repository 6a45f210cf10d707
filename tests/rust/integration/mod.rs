//! Integration tests - components working together over a full catalog,
//! without requiring an external database server.

mod pipeline_tests;
mod statement_generation_tests;
