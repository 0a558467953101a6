//! Integration tests for sli-search.
//!
//! The Splunk REST client is exercised against a local `wiremock` server;
//! no real Splunk deployment is needed.

mod splunk;
mod workflow;
