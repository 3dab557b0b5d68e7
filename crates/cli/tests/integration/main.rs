
mod delete_tests;
