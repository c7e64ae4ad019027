//! Common test utilities for hotload scenario and property tests.
//!
//! This module provides:
//! - `TestEnv`: an isolated project directory plus a context factory
//! - `LineTranslator` / `LineExecutor`: a tiny line-based source language
//! - `ManualWatchService`: a watch service driven by the test

#![allow(dead_code)]

pub mod lang;

pub use env::*;
