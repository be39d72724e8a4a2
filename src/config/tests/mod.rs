//! Unit tests for podlink configuration types.
//!
//! This module contains tests organised into:
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Serialisation and conversion tests
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence tests

mod helpers;
