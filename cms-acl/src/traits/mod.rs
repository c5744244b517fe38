// SPDX-License-Identifier: MIT OR Apache-2.0

mod document_store;

pub use document_store::DocumentStore;
