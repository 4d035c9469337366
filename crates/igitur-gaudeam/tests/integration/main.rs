//! Integration tests for igitur-gaudeam
//!
//! Uses wiremock to simulate a Gaudeam instance and its auth host and
//! verifies end-to-end behavior of login, drive traversal, uploads and
//! event media listing.

mod common;

mod test_auth;
mod test_calendar;
mod test_drive;
