mod handler_test;
mod support;
