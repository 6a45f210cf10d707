//! End-to-end tests - full query flow from YAML catalog to delivered
//! batches over an embedded SQLite database.

mod full_query_tests;
