//! Integration tests for the exported preload hooks.

#![cfg(target_os = "linux")]

mod interpose;
