//! A single-process account runtime with a time-weighted staking program.
//!
//! Accounts live in an [`runtime::AccountsDB`]; signed transactions go
//! through a [`runtime::Bank`], which verifies signatures and runs each
//! instruction against builtin programs. Programs may call each other
//! through [`runtime::InvokeContext::invoke_signed`], never gaining a
//! privilege their caller lacks, and a transaction commits all of its
//! effects or none.

pub mod address;
pub mod config;
pub mod error;
pub mod programs;
pub mod runtime;
pub mod types;
