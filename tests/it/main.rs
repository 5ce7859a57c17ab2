mod fixtures;
mod http_tests;
mod read_tests;
