mod public_tests;
mod session_tests;
